//! Coordination miner
//!
//! Records which files the author of each mined commit touched.

use super::expect_pair;
use crate::engine::{Miner, MiningContext, MiningMode, WorkUnit};
use crate::error::MiningResult;
use crate::processors::{CommitContribution, CoordinationProcessor, DataProcessor};

#[derive(Debug, Clone, Default)]
pub struct CoordinationMiner;

impl CoordinationMiner {
    pub fn new() -> Self {
        Self
    }
}

impl Miner for CoordinationMiner {
    type Processor = CoordinationProcessor;

    fn name(&self) -> &'static str {
        "coordination"
    }

    fn mode(&self) -> MiningMode {
        MiningMode::Pairwise
    }

    fn process(
        &self,
        context: &MiningContext<'_>,
        unit: &WorkUnit,
        processor: &CoordinationProcessor,
    ) -> MiningResult<()> {
        let (older, newer) = expect_pair(self.name(), unit)?;
        let changed = context.repository.changed_files(older, newer)?;
        if changed.is_empty() {
            return Ok(());
        }

        processor.process_data(CommitContribution {
            user: context.mappers.users.add(&newer.author),
            files: changed.iter().map(|path| context.mappers.files.add(path)).collect(),
        });
        Ok(())
    }
}
