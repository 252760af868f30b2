use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cascade_core::{
    load_cascade_config_from_env, synthetic_snapshot, write_network_stats, CascadeConfig,
    CascadeEngine, CascadeTrigger, TerritoryId, TerritorySnapshot,
};
use cascade_schema::{decode_snapshot, decode_snapshot_json, encode_snapshot, encode_snapshot_json};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Territorial cascade forecasting tool", long_about = None)]
struct Cli {
    /// Cascade config file; defaults to CASCADE_CONFIG_PATH or the bundled config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the network and print per-node statistics as JSON Lines.
    Stats {
        /// Snapshot file (JSON, or bincode when the extension is `.bin`).
        snapshot: PathBuf,
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Forecast the cascades started by a single control change.
    Analyze {
        snapshot: PathBuf,
        #[arg(long)]
        source: u32,
        #[arg(long, default_value = "territory_loss")]
        trigger: CascadeTrigger,
        #[arg(long, default_value_t = 1.0)]
        magnitude: f64,
    },
    /// Run a multi-wave chain-reaction simulation.
    Simulate {
        snapshot: PathBuf,
        #[arg(long)]
        source: u32,
        #[arg(long, default_value = "territory_loss")]
        trigger: CascadeTrigger,
        #[arg(long, default_value_t = 1.0)]
        magnitude: f64,
        /// Wave limit; defaults to `max_chain_waves` from the config.
        #[arg(long)]
        max_waves: Option<usize>,
    },
    /// Write a reproducible synthetic snapshot.
    Generate {
        #[arg(long, default_value_t = 100)]
        territories: usize,
        #[arg(long, default_value_t = 4)]
        factions: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Destination file (JSON, or bincode when the extension is `.bin`).
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    source: TerritoryId,
    trigger: CascadeTrigger,
    magnitude: f64,
    structural_version: u64,
    results: &'a T,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Stats { snapshot, output } => {
            let engine = engine_for(cli.config.as_deref(), &snapshot)?;
            let network = engine
                .network()
                .ok_or_else(|| eyre!("no network was published"))?;
            match output {
                Some(path) => cascade_core::export_network_stats(&network, &path)
                    .wrap_err_with(|| format!("exporting stats to {}", path.display()))?,
                None => write_network_stats(&network, io::stdout().lock())?,
            }
        }
        Command::Analyze {
            snapshot,
            source,
            trigger,
            magnitude,
        } => {
            let engine = engine_for(cli.config.as_deref(), &snapshot)?;
            let source = known_source(&engine, source)?;
            let events = engine.analyze(source, trigger, magnitude);
            print_report(&engine, source, trigger, magnitude, &events)?;
        }
        Command::Simulate {
            snapshot,
            source,
            trigger,
            magnitude,
            max_waves,
        } => {
            let engine = engine_for(cli.config.as_deref(), &snapshot)?;
            let source = known_source(&engine, source)?;
            let waves = engine.simulate_chain(source, trigger, magnitude, max_waves);
            print_report(&engine, source, trigger, magnitude, &waves)?;
        }
        Command::Generate {
            territories,
            factions,
            seed,
            output,
        } => {
            let snapshot = synthetic_snapshot(territories, factions, seed);
            write_snapshot(&snapshot, &output)?;
            info!(
                target: "cascade::cli",
                path = %output.display(),
                territories,
                hash = snapshot.header.hash,
                "snapshot.generated"
            );
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Arc<CascadeConfig>> {
    match path {
        Some(path) => Ok(Arc::new(CascadeConfig::from_file(path)?)),
        None => Ok(load_cascade_config_from_env().0),
    }
}

fn engine_for(config: Option<&Path>, snapshot: &Path) -> Result<CascadeEngine> {
    let engine = CascadeEngine::new(load_config(config)?);
    let snapshot = read_snapshot(snapshot)?;
    engine
        .rebuild(&snapshot)
        .wrap_err("building territory network")?;
    Ok(engine)
}

fn known_source(engine: &CascadeEngine, source: u32) -> Result<TerritoryId> {
    let id = TerritoryId(source);
    let network = engine
        .network()
        .ok_or_else(|| eyre!("no network was published"))?;
    if !network.contains(id) {
        // The engine tolerates unknown sources; on the command line it is a typo.
        return Err(eyre!("territory {id} is not in the snapshot"));
    }
    Ok(id)
}

fn is_binary(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bin")
}

fn read_snapshot(path: &Path) -> Result<TerritorySnapshot> {
    let snapshot = if is_binary(path) {
        let bytes =
            fs::read(path).wrap_err_with(|| format!("reading snapshot {}", path.display()))?;
        decode_snapshot(&bytes)?
    } else {
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading snapshot {}", path.display()))?;
        decode_snapshot_json(&text)?
    };
    Ok(snapshot)
}

fn write_snapshot(snapshot: &TerritorySnapshot, path: &Path) -> Result<()> {
    let bytes = if is_binary(path) {
        encode_snapshot(snapshot)?
    } else {
        encode_snapshot_json(snapshot)?.into_bytes()
    };
    fs::write(path, bytes).wrap_err_with(|| format!("writing snapshot {}", path.display()))
}

fn print_report<T: Serialize>(
    engine: &CascadeEngine,
    source: TerritoryId,
    trigger: CascadeTrigger,
    magnitude: f64,
    results: &T,
) -> Result<()> {
    let structural_version = engine
        .network()
        .map(|network| network.structural_version())
        .unwrap_or_default();
    let report = Report {
        source,
        trigger,
        magnitude,
        structural_version,
        results,
    };
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;
    Ok(())
}
