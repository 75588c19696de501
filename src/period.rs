//! Periodization of commit history
//!
//! Splits a newest-first commit sequence into consecutive periods, either by
//! calendar months or by a fixed number of commits, and builds the commit ->
//! period lookup the periodized miners read during the parallel phase.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Months, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MiningError, MiningResult};
use crate::git::Commit;

/// How commits are grouped into periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum PeriodPolicy {
    /// Periods spanning `months` calendar months each
    TimeBased { months: u32 },
    /// Periods of `commits` consecutive commits each
    CountBased { commits: usize },
}

impl PeriodPolicy {
    pub fn validate(&self) -> MiningResult<()> {
        match self {
            PeriodPolicy::TimeBased { months: 0 } => {
                Err(MiningError::configuration("months per period must be greater than zero"))
            }
            PeriodPolicy::CountBased { commits: 0 } => {
                Err(MiningError::configuration("commits per period must be greater than zero"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for PeriodPolicy {
    fn default() -> Self {
        PeriodPolicy::TimeBased { months: 1 }
    }
}

/// Period kind as named in configuration files and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Time,
    Count,
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time" | "time-based" => Ok(PeriodType::Time),
            "count" | "count-based" | "commits" => Ok(PeriodType::Count),
            _ => Err(format!("Invalid period type: {}. Valid options: time, count", s)),
        }
    }
}

/// One period of history, newest commits first
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub index: usize,
    /// Inclusive lower time boundary of a time-based period
    pub lower_bound: Option<DateTime<Utc>>,
    pub commits: Vec<Commit>,
}

/// Read-only commit hash -> period index lookup
#[derive(Debug, Clone, Default)]
pub struct PeriodAssignment {
    by_commit: HashMap<String, usize>,
    period_count: usize,
}

impl PeriodAssignment {
    pub fn from_periods(periods: &[Period]) -> Self {
        let by_commit = periods
            .iter()
            .flat_map(|period| period.commits.iter().map(move |commit| (commit.hash.clone(), period.index)))
            .collect();
        Self {
            by_commit,
            period_count: periods.len(),
        }
    }

    pub fn period_of(&self, hash: &str) -> Option<usize> {
        self.by_commit.get(hash).copied()
    }

    pub fn period_count(&self) -> usize {
        self.period_count
    }

    pub fn len(&self) -> usize {
        self.by_commit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_commit.is_empty()
    }
}

/// Split `commits` (newest first) into periods according to `policy`.
pub fn split_into_periods(commits: &[Commit], policy: PeriodPolicy) -> MiningResult<Vec<Period>> {
    policy.validate()?;
    if commits.is_empty() {
        return Ok(Vec::new());
    }

    match policy {
        PeriodPolicy::CountBased { commits: size } => Ok(commits
            .chunks(size)
            .enumerate()
            .map(|(index, chunk)| Period {
                index,
                lower_bound: None,
                commits: chunk.to_vec(),
            })
            .collect()),
        PeriodPolicy::TimeBased { months } => split_by_months(commits, months),
    }
}

fn split_by_months(commits: &[Commit], months: u32) -> MiningResult<Vec<Period>> {
    let step = Months::new(months);
    let first = commit_time(&commits[0])?;
    let midnight = first.date_naive().and_time(NaiveTime::MIN).and_utc();
    let mut boundary = step_back(midnight, step)?;

    let mut periods = Vec::new();
    let mut current = Vec::new();
    for commit in commits {
        let time = commit_time(commit)?;
        while time < boundary {
            periods.push(Period {
                index: periods.len(),
                lower_bound: Some(boundary),
                commits: std::mem::take(&mut current),
            });
            boundary = step_back(boundary, step)?;
        }
        current.push(commit.clone());
    }

    if !current.is_empty() {
        periods.push(Period {
            index: periods.len(),
            lower_bound: Some(boundary),
            commits: current,
        });
    }
    Ok(periods)
}

fn commit_time(commit: &Commit) -> MiningResult<DateTime<Utc>> {
    DateTime::from_timestamp(commit.timestamp, 0).ok_or_else(|| {
        MiningError::job(format!("Commit {} has an invalid timestamp {}", commit.hash, commit.timestamp))
    })
}

fn step_back(time: DateTime<Utc>, step: Months) -> MiningResult<DateTime<Utc>> {
    time.checked_sub_months(step)
        .ok_or_else(|| MiningError::configuration(format!("Period boundary before {} is out of range", time)))
}
