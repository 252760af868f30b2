//! JSON Lines export of network statistics for offline inspection.
//!
//! One `node` record per territory in ascending id order, then a single
//! `summary` record.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cascade_schema::{NetworkStatsRecord, NetworkSummaryRecord, NodeStatsRecord};
use thiserror::Error;
use tracing::info;

use crate::network::TerritoryNetwork;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write network stats to {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize network stats: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub fn network_stats_records(network: &TerritoryNetwork) -> Vec<NetworkStatsRecord> {
    let mut records: Vec<NetworkStatsRecord> = network
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| {
            NetworkStatsRecord::Node(NodeStatsRecord {
                id: node.id,
                name: node.name.clone(),
                strategic_value: node.strategic_value,
                controller: node.controller,
                contested: node.contested,
                degree: network.degree(index),
                degree_centrality: node.centrality.degree,
                closeness: node.centrality.closeness,
                betweenness: node.centrality.betweenness,
                eigenvector: node.centrality.eigenvector,
                connectivity: node.connectivity,
                vulnerability: node.vulnerability,
                economic_importance: node.economic_importance,
            })
        })
        .collect();

    records.push(NetworkStatsRecord::Summary(NetworkSummaryRecord {
        node_count: network.node_count(),
        edge_count: network.edge_count(),
        contested_count: network.nodes().iter().filter(|node| node.contested).count(),
        average_connectivity: network.average_connectivity(),
        average_vulnerability: network.average_vulnerability(),
        average_economic_importance: network.average_economic_importance(),
        centrality_strategy: network.centrality_strategy().to_string(),
        structural_version: network.structural_version(),
        snapshot_hash: network.snapshot_hash(),
    }));
    records
}

/// Render the statistics as JSON Lines text.
pub fn render_network_stats(network: &TerritoryNetwork) -> serde_json::Result<String> {
    let mut out = String::new();
    for record in network_stats_records(network) {
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn write_network_stats<W: Write>(network: &TerritoryNetwork, mut writer: W) -> io::Result<()> {
    for record in network_stats_records(network) {
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

pub fn export_network_stats(network: &TerritoryNetwork, path: &Path) -> Result<(), ExportError> {
    let rendered = render_network_stats(network)?;
    fs::write(path, rendered).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        target: "cascade::export",
        path = %path.display(),
        nodes = network.node_count(),
        "export.network_stats"
    );
    Ok(())
}
