//! Application execution: runs one miner and exports its results

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::config::MinerConfig;
use crate::engine::{Miner, MiningEngine, MiningRun, RunStats};
use crate::export::{self, Artifact, GraphData};
use crate::git::GitOpener;
use crate::miners::{ChurnMiner, CoEditMiner, CoordinationMiner, MinerKind, OwnershipMiner};
use crate::processors::{
    ChurnProcessor, CoEditProcessor, CoordinationProcessor, DataProcessor, OwnershipProcessor,
};
use crate::registry::Mappers;

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub miner: MinerKind,
    pub artifact: PathBuf,
    pub graph: Option<PathBuf>,
    pub stats: RunStats,
}

/// Mine `repository` with `kind` and write the artifact (and graph, when a
/// top-n is configured) into the configured output directory
pub fn run_miner(repository: &Path, kind: MinerKind, config: &MinerConfig) -> Result<RunSummary> {
    let opener = Arc::new(GitOpener::new(repository));
    let engine = MiningEngine::new(opener, config.engine_config());
    debug!("Engine configuration: {:?}", engine.config());

    match kind {
        MinerKind::Churn => {
            let miner = ChurnMiner::new(config.period_policy).with_file_filter(config.file_filter.iter().cloned());
            let processor = ChurnProcessor::new(config.churn_mode);
            mine_and_export(&engine, kind, repository, config, miner, processor, None)
        }
        MinerKind::Ownership => mine_and_export(
            &engine,
            kind,
            repository,
            config,
            OwnershipMiner::new(),
            OwnershipProcessor::new(config.half_life_days),
            Some(export::ownership_graph as GraphBuilder<_>),
        ),
        MinerKind::CoEdit => mine_and_export(
            &engine,
            kind,
            repository,
            config,
            CoEditMiner::new(),
            CoEditProcessor::new(),
            Some(export::co_edit_graph as GraphBuilder<_>),
        ),
        MinerKind::Coordination => mine_and_export(
            &engine,
            kind,
            repository,
            config,
            CoordinationMiner::new(),
            CoordinationProcessor::new(),
            Some(export::coordination_graph as GraphBuilder<_>),
        ),
    }
}

type GraphBuilder<O> = fn(&O, &Mappers, usize, bool) -> GraphData;

fn mine_and_export<M: Miner>(
    engine: &MiningEngine,
    kind: MinerKind,
    repository: &Path,
    config: &MinerConfig,
    miner: M,
    processor: M::Processor,
    graph: Option<GraphBuilder<<M::Processor as DataProcessor>::Output>>,
) -> Result<RunSummary> {
    let processor = Arc::new(processor);
    let run: MiningRun = engine
        .run(Arc::new(miner), Arc::clone(&processor))
        .with_context(|| format!("Failed to mine {}", repository.display()))?;
    let output = processor
        .output()
        .with_context(|| format!("{} produced no result", kind))?;

    let artifact = Artifact::new(kind, Some(repository), &run, output);
    let artifact_path = export::write_artifact(&config.output_dir, &artifact)?;

    let graph_path = match (graph, config.top_n) {
        (Some(build), Some(size)) => {
            let data = build(output, &run.mappers, size, config.descending);
            info!("Exporting {} graph edges", data.edges.len());
            Some(export::write_graph(&config.output_dir, kind, &data)?)
        }
        _ => None,
    };

    Ok(RunSummary {
        miner: kind,
        artifact: artifact_path,
        graph: graph_path,
        stats: run.stats,
    })
}

/// Summary printed to stdout once a run completes
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport<'a> {
    pub miner: MinerKind,
    pub artifact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
    pub stats: &'a RunStats,
}

impl RunSummary {
    pub fn report(&self) -> SummaryReport<'_> {
        SummaryReport {
            miner: self.miner,
            artifact: self.artifact.display().to_string(),
            graph: self.graph.as_ref().map(|p| p.display().to_string()),
            stats: &self.stats,
        }
    }
}
