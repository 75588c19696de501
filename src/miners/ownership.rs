//! Ownership miner
//!
//! Credits the lines each commit adds to the commit's author, on the day the
//! commit was made.

use std::collections::BTreeMap;

use super::{epoch_day, expect_pair};
use crate::engine::{Miner, MiningContext, MiningMode, WorkUnit};
use crate::error::MiningResult;
use crate::processors::{AuthoredLines, DataProcessor, OwnershipProcessor};

#[derive(Debug, Clone, Default)]
pub struct OwnershipMiner;

impl OwnershipMiner {
    pub fn new() -> Self {
        Self
    }
}

impl Miner for OwnershipMiner {
    type Processor = OwnershipProcessor;

    fn name(&self) -> &'static str {
        "ownership"
    }

    fn mode(&self) -> MiningMode {
        MiningMode::Pairwise
    }

    fn process(&self, context: &MiningContext<'_>, unit: &WorkUnit, processor: &OwnershipProcessor) -> MiningResult<()> {
        let (older, newer) = expect_pair(self.name(), unit)?;

        let mut authored: BTreeMap<String, u64> = BTreeMap::new();
        for edit in context.repository.diff(older, newer)? {
            if edit.post_len_in_lines > 0 {
                *authored.entry(edit.path().to_string()).or_insert(0) += u64::from(edit.post_len_in_lines);
            }
        }
        if authored.is_empty() {
            return Ok(());
        }

        let user = context.mappers.users.add(&newer.author);
        let day = epoch_day(newer.timestamp);
        for (path, lines) in authored {
            processor.process_data(AuthoredLines {
                user,
                file: context.mappers.files.add(&path),
                lines,
                day,
            });
        }
        Ok(())
    }
}
