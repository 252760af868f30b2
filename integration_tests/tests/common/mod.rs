#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use anyhow::Context;
use cascade_core::{CascadeEngine, TerritorySnapshot, CASCADE_CONFIG_ENV};
use cascade_schema::decode_snapshot_json;

static INIT: Once = Once::new();

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture_path("test_cascade_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test cascade config at {}",
            config_path.display()
        );

        std::env::set_var(CASCADE_CONFIG_ENV, &config_path);
    });
}

pub fn load_snapshot(name: &str) -> anyhow::Result<TerritorySnapshot> {
    let path = fixture_path(name);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    Ok(decode_snapshot_json(&text)?.finalize())
}

/// Engine configured from the test config with `name` already published.
pub fn engine_with(name: &str) -> anyhow::Result<CascadeEngine> {
    ensure_test_config();
    let engine = CascadeEngine::from_env();
    engine.rebuild(&load_snapshot(name)?)?;
    Ok(engine)
}
