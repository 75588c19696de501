//! Churn miner
//!
//! Attributes the change introduced by each feature commit (its diff against
//! its first parent) to the commit's period. Bug-fix commits are left out.

use std::collections::{BTreeMap, HashSet};

use log::trace;

use crate::engine::{Miner, MiningContext, MiningMode, WorkUnit};
use crate::error::{MiningError, MiningResult};
use crate::period::PeriodPolicy;
use crate::processors::{ChurnMode, ChurnProcessor, DataProcessor, FileModification};

#[derive(Debug, Clone)]
pub struct ChurnMiner {
    policy: PeriodPolicy,
    /// Paths (files or directories) to restrict mining to; empty mines everything
    file_filter: HashSet<String>,
}

impl ChurnMiner {
    pub fn new(policy: PeriodPolicy) -> Self {
        Self {
            policy,
            file_filter: HashSet::new(),
        }
    }

    pub fn with_file_filter<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_filter = paths
            .into_iter()
            .map(|p| {
                let path: String = p.into();
                path.trim_end_matches('/').to_string()
            })
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    fn accepts(&self, path: &str) -> bool {
        if self.file_filter.is_empty() || self.file_filter.contains(path) {
            return true;
        }
        // Directory entries match everything below them
        path.match_indices('/')
            .any(|(index, _)| self.file_filter.contains(&path[..index]))
    }
}

impl Miner for ChurnMiner {
    type Processor = ChurnProcessor;

    fn name(&self) -> &'static str {
        "churn"
    }

    fn mode(&self) -> MiningMode {
        MiningMode::Periodized(self.policy)
    }

    fn process(&self, context: &MiningContext<'_>, unit: &WorkUnit, processor: &ChurnProcessor) -> MiningResult<()> {
        let WorkUnit::Periodized { commit, period } = unit else {
            return Err(MiningError::job("churn mines periodized commits, got a commit pair"));
        };

        if context.repository.is_bug_fix(commit) {
            trace!("Skipping bug-fix commit {}", commit.hash);
            return Ok(());
        }

        let mut churn: BTreeMap<String, u64> = BTreeMap::new();
        match processor.mode() {
            ChurnMode::Lines => {
                for edit in context.repository.commit_diff(commit)? {
                    if self.accepts(edit.path()) {
                        *churn.entry(edit.path().to_string()).or_insert(0) += u64::from(edit.modified_lines());
                    }
                }
            }
            ChurnMode::Files => {
                for path in context.repository.commit_changed_files(commit)? {
                    if self.accepts(&path) {
                        churn.insert(path, 1);
                    }
                }
            }
        }

        for (path, weight) in churn {
            processor.process_data(FileModification {
                period: *period,
                file: context.mappers.files.add(&path),
                weight,
            });
        }
        Ok(())
    }
}
