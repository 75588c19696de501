//! Mining Engine
//!
//! Walks the resolved branches one at a time. For every branch the adjacent
//! commit pairs (or, for periodized miners, the single commits) not yet
//! claimed by an earlier branch are dispatched to the worker pool, and the
//! controlling thread waits for all of them before moving on. Once the last
//! branch drains, the processor is finalized.

pub mod pool;

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::sync::WaitGroup;
use log::{debug, info, warn};
use serde::Serialize;

use crate::dedup::CommitPairDeduplicator;
use crate::error::{MiningError, MiningResult};
use crate::git::{BranchRef, Commit, RepositoryAccess, RepositoryOpener};
use crate::period::{split_into_periods, PeriodAssignment, PeriodPolicy};
use crate::processors::DataProcessor;
use crate::registry::Mappers;

pub use pool::{WorkerInit, WorkerPool};

/// Completions between progress log lines
pub const DEFAULT_LOG_FREQUENCY: usize = 100;

/// One job handed to a miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    /// Adjacent commits of a branch, plus the commit following `newer` on it
    /// (`None` at the branch tip)
    Pair {
        older: Commit,
        newer: Commit,
        next: Option<Commit>,
    },
    /// A commit and its period; the commit is mined against its own parent
    Periodized { commit: Commit, period: usize },
}

impl WorkUnit {
    pub fn pair(older: Commit, newer: Commit) -> Self {
        WorkUnit::Pair { older, newer, next: None }
    }

    /// The newest commit the unit covers
    pub fn commit(&self) -> &Commit {
        match self {
            WorkUnit::Pair { newer, .. } => newer,
            WorkUnit::Periodized { commit, .. } => commit,
        }
    }

    fn label(&self) -> String {
        match self {
            WorkUnit::Pair { older, newer, .. } => {
                format!("{}..{}", short_hash(&older.hash), short_hash(&newer.hash))
            }
            WorkUnit::Periodized { commit, .. } => short_hash(&commit.hash).to_string(),
        }
    }
}

/// How a miner wants its work cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningMode {
    Pairwise,
    Periodized(PeriodPolicy),
}

/// What a miner can reach while processing a unit of work
pub struct MiningContext<'a> {
    /// The executing worker's private repository handle
    pub repository: &'a dyn RepositoryAccess,
    pub mappers: &'a Mappers,
}

/// Per-unit extraction logic of a metric
pub trait Miner: Send + Sync + 'static {
    type Processor: DataProcessor;

    fn name(&self) -> &'static str;

    fn mode(&self) -> MiningMode;

    /// Extract facts from one unit of work and hand them to the processor.
    /// Called concurrently from worker threads.
    fn process(
        &self,
        context: &MiningContext<'_>,
        unit: &WorkUnit,
        processor: &Self::Processor,
    ) -> MiningResult<()>;
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub threads: usize,
    /// Branch names or `*` patterns; empty means the current HEAD
    pub branches: Vec<String>,
    /// Walk commits oldest first
    pub reversed: bool,
    pub log_frequency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            branches: Vec::new(),
            reversed: false,
            log_frequency: DEFAULT_LOG_FREQUENCY,
        }
    }
}

/// Counters of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub branches_mined: usize,
    pub submitted_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    /// Units already claimed by an earlier branch (commit pairs, or single
    /// commits for periodized miners)
    pub skipped_pairs: usize,
}

/// Result of [`MiningEngine::run`]: statistics plus the id mappings needed to
/// decode the processor's output
pub struct MiningRun {
    pub stats: RunStats,
    pub mappers: Arc<Mappers>,
}

pub struct MiningEngine {
    opener: Arc<dyn RepositoryOpener>,
    config: EngineConfig,
}

impl MiningEngine {
    pub fn new(opener: Arc<dyn RepositoryOpener>, config: EngineConfig) -> Self {
        Self { opener, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve the configured branch patterns
    pub fn resolve_branches(&self) -> MiningResult<Vec<BranchRef>> {
        let repository = self.opener.open()?;
        self.resolve_with(repository.as_ref())
    }

    fn resolve_with(&self, repository: &dyn RepositoryAccess) -> MiningResult<Vec<BranchRef>> {
        let branches = repository.list_branch_refs(&self.config.branches)?;
        if branches.is_empty() {
            warn!("No branch matched {:?}; nothing to mine", self.config.branches);
        }
        Ok(branches)
    }

    /// Mine every resolved branch with `miner`, feeding `processor`, then
    /// finalize the processor.
    pub fn run<M: Miner>(&self, miner: Arc<M>, processor: Arc<M::Processor>) -> MiningResult<MiningRun> {
        let started = Instant::now();
        let repository = self.opener.open()?;
        let branches = self.resolve_with(repository.as_ref())?;

        let mut histories = Vec::with_capacity(branches.len());
        for branch in branches {
            let commits = repository.list_commits(&branch, self.config.reversed)?;
            debug!("{}: {} commits", branch.short_name, commits.len());
            histories.push((branch, commits));
        }

        let periods = match miner.mode() {
            MiningMode::Pairwise => None,
            MiningMode::Periodized(policy) => Some(Arc::new(self.assign_periods(&histories, policy)?)),
        };

        let mappers = Arc::new(Mappers::new());
        let dedup = CommitPairDeduplicator::new();
        let opener = Arc::clone(&self.opener);
        let init: WorkerInit<Box<dyn RepositoryAccess>> = Arc::new(move || opener.open());
        let pool = WorkerPool::new(self.config.threads, init)?;

        info!(
            "Mining {} branch(es) with {} using {} worker(s)",
            histories.len(),
            miner.name(),
            pool.size()
        );

        let failed = Arc::new(AtomicUsize::new(0));
        let mut stats = RunStats::default();

        for (branch, commits) in &histories {
            if commits.len() < 2 {
                info!("Skipping {}: fewer than two commits", branch.short_name);
                continue;
            }

            let chronological: Vec<&Commit> = if self.config.reversed {
                commits.iter().collect()
            } else {
                commits.iter().rev().collect()
            };

            // Claim keys: `(older, newer)` ids for pairs, `(id, id)` for single commits
            let mut pending = Vec::new();
            match &periods {
                None => {
                    for (index, window) in chronological.windows(2).enumerate() {
                        let (older, newer) = (window[0], window[1]);
                        let older_id = mappers.commits.add(&older.hash);
                        let newer_id = mappers.commits.add(&newer.hash);
                        if dedup.is_claimed(older_id, newer_id) {
                            stats.skipped_pairs += 1;
                            continue;
                        }
                        let unit = WorkUnit::Pair {
                            older: older.clone(),
                            newer: newer.clone(),
                            next: chronological.get(index + 2).map(|next| (*next).clone()),
                        };
                        pending.push(((older_id, newer_id), unit));
                    }
                }
                Some(assignment) => {
                    for commit in &chronological {
                        let id = mappers.commits.add(&commit.hash);
                        if dedup.is_commit_claimed(id) {
                            stats.skipped_pairs += 1;
                            continue;
                        }
                        let period = assignment
                            .period_of(&commit.hash)
                            .ok_or_else(|| MiningError::job(format!("commit {} has no period", commit.hash)))?;
                        let unit = WorkUnit::Periodized {
                            commit: (*commit).clone(),
                            period,
                        };
                        pending.push(((id, id), unit));
                    }
                }
            }
            if pending.is_empty() {
                info!("Skipping {}: every commit was already mined", branch.short_name);
                continue;
            }

            info!("Mining branch {} ({} jobs)", branch.short_name, pending.len());
            let branch_started = Instant::now();
            let barrier = WaitGroup::new();
            let completed = Arc::new(AtomicUsize::new(0));
            let total = pending.len();

            for ((first_id, second_id), unit) in pending {
                if !dedup.claim(first_id, second_id) {
                    stats.skipped_pairs += 1;
                    continue;
                }

                let job = Job {
                    miner: Arc::clone(&miner),
                    processor: Arc::clone(&processor),
                    mappers: Arc::clone(&mappers),
                    completed: Arc::clone(&completed),
                    failed: Arc::clone(&failed),
                    branch: branch.short_name.clone(),
                    total,
                    log_frequency: self.config.log_frequency.max(1),
                    _barrier: barrier.clone(),
                };
                pool.execute(move |repository| job.execute(repository, &unit))?;
                stats.submitted_jobs += 1;
            }

            barrier.wait();
            stats.branches_mined += 1;
            stats.completed_jobs += completed.load(Ordering::SeqCst);
            info!(
                "Finished branch {} in {:.2?}",
                branch.short_name,
                branch_started.elapsed()
            );
        }

        drop(pool);
        stats.failed_jobs = failed.load(Ordering::SeqCst);

        processor.calculate();
        info!(
            "{} finished in {:.2?}: {} jobs, {} failed, {} skipped",
            miner.name(),
            started.elapsed(),
            stats.completed_jobs,
            stats.failed_jobs,
            stats.skipped_pairs
        );

        Ok(MiningRun { stats, mappers })
    }

    /// Periods over the union of all branch histories, newest first
    fn assign_periods(
        &self,
        histories: &[(BranchRef, Vec<Commit>)],
        policy: PeriodPolicy,
    ) -> MiningResult<PeriodAssignment> {
        let mut seen = HashSet::new();
        let mut timeline: Vec<Commit> = histories
            .iter()
            .flat_map(|(_, commits)| commits.iter())
            .filter(|commit| seen.insert(commit.hash.as_str()))
            .cloned()
            .collect();
        timeline.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.hash.cmp(&b.hash)));

        let periods = split_into_periods(&timeline, policy)?;
        let assignment = PeriodAssignment::from_periods(&periods);
        info!(
            "Split {} commits into {} period(s) ({:?})",
            assignment.len(),
            assignment.period_count(),
            policy
        );
        Ok(assignment)
    }
}

/// Everything a dispatched unit needs besides the unit itself. Dropping it
/// releases the branch barrier.
struct Job<M: Miner> {
    miner: Arc<M>,
    processor: Arc<M::Processor>,
    mappers: Arc<Mappers>,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    branch: String,
    total: usize,
    log_frequency: usize,
    _barrier: WaitGroup,
}

impl<M: Miner> Job<M> {
    fn execute(self, repository: Result<&Box<dyn RepositoryAccess>, &MiningError>, unit: &WorkUnit) {
        let outcome = match repository {
            Ok(repository) => {
                let context = MiningContext {
                    repository: repository.as_ref(),
                    mappers: &self.mappers,
                };
                panic::catch_unwind(AssertUnwindSafe(|| {
                    self.miner.process(&context, unit, &self.processor)
                }))
                .unwrap_or_else(|payload| {
                    Err(MiningError::job(format!("panicked: {}", panic_message(payload.as_ref()))))
                })
            }
            Err(e) => Err(MiningError::job(format!("no repository handle: {}", e))),
        };

        if let Err(e) = outcome {
            self.failed.fetch_add(1, Ordering::SeqCst);
            warn!("{}: {} failed: {}", self.miner.name(), unit.label(), e);
        }

        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if done % self.log_frequency == 0 || done == self.total {
            info!("{}: {}/{} jobs done", self.branch, done, self.total);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hash: &str, timestamp: i64) -> Commit {
        Commit {
            hash: hash.to_string(),
            author: "dev@example.com".to_string(),
            timestamp,
            message: String::new(),
        }
    }

    #[test]
    fn test_work_unit_accessors() {
        let pair = WorkUnit::pair(commit("a", 1), commit("b", 2));
        assert_eq!(pair.commit().hash, "b");
        assert_eq!(pair.label(), "a..b");
        assert!(matches!(pair, WorkUnit::Pair { next: None, .. }));

        let periodized = WorkUnit::Periodized {
            commit: commit("0123456789abcdef", 4),
            period: 0,
        };
        assert_eq!(periodized.commit().timestamp, 4);
        assert_eq!(periodized.label(), "01234567");
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("broken diff")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "broken diff");

        let payload = panic::catch_unwind(|| panic!("{} failures", 2)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "2 failures");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "01234567");
        assert_eq!(short_hash("abc"), "abc");
    }
}
