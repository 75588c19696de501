//! Churn per period and file

use std::collections::BTreeMap;
use std::str::FromStr;

use dashmap::DashMap;
use log::info;
use serde::{Deserialize, Serialize};

use super::{Calculated, DataProcessor};

/// What a unit of churn counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChurnMode {
    /// Added plus deleted lines
    #[default]
    Lines,
    /// One per changed file per commit
    Files,
}

impl FromStr for ChurnMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lines" => Ok(ChurnMode::Lines),
            "files" | "file" => Ok(ChurnMode::Files),
            _ => Err(format!("Invalid change type: {}. Valid options: lines, files", s)),
        }
    }
}

/// A file modified within a period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileModification {
    pub period: usize,
    pub file: u32,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnOutput {
    pub change_type: ChurnMode,
    /// period -> file id -> churn
    pub periods: BTreeMap<usize, BTreeMap<u32, u64>>,
    /// period -> total churn
    pub period_totals: BTreeMap<usize, u64>,
}

/// Accumulates churn keyed by (period, file)
#[derive(Debug)]
pub struct ChurnProcessor {
    mode: ChurnMode,
    churn: DashMap<(usize, u32), u64>,
    result: Calculated<ChurnOutput>,
}

impl ChurnProcessor {
    pub fn new(mode: ChurnMode) -> Self {
        Self {
            mode,
            churn: DashMap::new(),
            result: Calculated::new(),
        }
    }

    pub fn mode(&self) -> ChurnMode {
        self.mode
    }
}

impl Default for ChurnProcessor {
    fn default() -> Self {
        Self::new(ChurnMode::default())
    }
}

impl DataProcessor for ChurnProcessor {
    type Fact = FileModification;
    type Output = ChurnOutput;

    fn name(&self) -> &'static str {
        "churn"
    }

    fn process_data(&self, fact: FileModification) {
        if fact.weight == 0 {
            return;
        }
        *self.churn.entry((fact.period, fact.file)).or_insert(0) += fact.weight;
    }

    fn calculate(&self) {
        self.result.finalize(self.name(), || {
            let mut periods: BTreeMap<usize, BTreeMap<u32, u64>> = BTreeMap::new();
            for entry in self.churn.iter() {
                let (period, file) = *entry.key();
                periods.entry(period).or_default().insert(file, *entry.value());
            }
            let period_totals: BTreeMap<usize, u64> = periods
                .iter()
                .map(|(period, files)| (*period, files.values().sum()))
                .collect();

            info!(
                "Churn calculated: {} periods, {} period/file entries",
                periods.len(),
                self.churn.len()
            );
            ChurnOutput {
                change_type: self.mode,
                periods,
                period_totals,
            }
        });
    }

    fn output(&self) -> Option<&ChurnOutput> {
        self.result.get()
    }
}
