//! Persisting mined results
//!
//! Every run produces `<dir>/<miner>.json` holding the id mappings, the run
//! statistics and the processor output. Relationship miners can additionally
//! write a capped graph to `<dir>/<miner>_graph.json`.

pub mod graph;
pub mod top_n;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::engine::{MiningRun, RunStats};
use crate::error::{MiningError, MiningResult};
use crate::miners::MinerKind;

pub use graph::{co_edit_graph, coordination_graph, ownership_graph, GraphData, GraphEdge, GraphNode, NodeKind};
pub use top_n::TopNSelector;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub miner: MinerKind,
    pub exported_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Self-describing output of one run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact<'a, T: Serialize> {
    pub metadata: ExportMetadata,
    pub id_to_user: BTreeMap<u32, String>,
    pub id_to_file: BTreeMap<u32, String>,
    pub id_to_commit: BTreeMap<u32, String>,
    pub stats: &'a RunStats,
    pub result: &'a T,
}

impl<'a, T: Serialize> Artifact<'a, T> {
    pub fn new(miner: MinerKind, repository: Option<&Path>, run: &'a MiningRun, result: &'a T) -> Self {
        Self {
            metadata: ExportMetadata {
                miner,
                exported_at: chrono::Utc::now().to_rfc3339(),
                repository: repository.map(|p| p.display().to_string()),
            },
            id_to_user: run.mappers.users.id_to_value(),
            id_to_file: run.mappers.files.id_to_value(),
            id_to_commit: run.mappers.commits.id_to_value(),
            stats: &run.stats,
            result,
        }
    }
}

pub fn artifact_path(dir: &Path, miner: MinerKind) -> PathBuf {
    dir.join(format!("{}.json", miner.name()))
}

pub fn graph_path(dir: &Path, miner: MinerKind) -> PathBuf {
    dir.join(format!("{}_graph.json", miner.name()))
}

/// Write `value` as pretty JSON, creating parent directories as needed
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> MiningResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            MiningError::export(format!("Failed to create output directory {}: {}", parent.display(), e))
        })?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| MiningError::export(format!("Failed to write {}: {}", path.display(), e)))?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn write_artifact<T: Serialize>(dir: &Path, artifact: &Artifact<'_, T>) -> MiningResult<PathBuf> {
    let path = artifact_path(dir, artifact.metadata.miner);
    write_json(&path, artifact)?;
    Ok(path)
}

pub fn write_graph(dir: &Path, miner: MinerKind, graph: &GraphData) -> MiningResult<PathBuf> {
    let path = graph_path(dir, miner);
    write_json(&path, graph)?;
    Ok(path)
}
