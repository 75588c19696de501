//! File ownership among contributors
//!
//! Lines authored by a developer count towards their ownership of a file,
//! decayed exponentially by how long ago (relative to the newest mined change)
//! they were written. Each file's weights are normalized into shares.

use std::collections::BTreeMap;

use dashmap::DashMap;
use log::info;
use serde::Serialize;

use super::{stable_sum, Calculated, DataProcessor};

/// Seconds per day, used to bucket authored lines
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Default half-life of authored lines, in days
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 365.0;

/// Lines a developer wrote in a file on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthoredLines {
    pub user: u32,
    pub file: u32,
    pub lines: u64,
    /// Days since the epoch
    pub day: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipOutput {
    pub half_life_days: f64,
    /// user id -> file id -> ownership share in `(0, 1]`
    pub developer_knowledge: BTreeMap<u32, BTreeMap<u32, f64>>,
    /// file id -> users holding the largest share (several on a tie)
    pub file_owners: BTreeMap<u32, Vec<u32>>,
}

#[derive(Debug)]
pub struct OwnershipProcessor {
    half_life_days: f64,
    authored: DashMap<(u32, u32, i64), u64>,
    result: Calculated<OwnershipOutput>,
}

impl OwnershipProcessor {
    pub fn new(half_life_days: f64) -> Self {
        Self {
            half_life_days,
            authored: DashMap::new(),
            result: Calculated::new(),
        }
    }

    fn decay(&self, age_days: i64) -> f64 {
        if self.half_life_days <= 0.0 {
            return 1.0;
        }
        0.5f64.powf(age_days as f64 / self.half_life_days)
    }
}

impl Default for OwnershipProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_LIFE_DAYS)
    }
}

impl DataProcessor for OwnershipProcessor {
    type Fact = AuthoredLines;
    type Output = OwnershipOutput;

    fn name(&self) -> &'static str {
        "ownership"
    }

    fn process_data(&self, fact: AuthoredLines) {
        if fact.lines == 0 {
            return;
        }
        *self.authored.entry((fact.user, fact.file, fact.day)).or_insert(0) += fact.lines;
    }

    fn calculate(&self) {
        self.result.finalize(self.name(), || {
            let authored: BTreeMap<(u32, u32, i64), u64> =
                self.authored.iter().map(|entry| (*entry.key(), *entry.value())).collect();
            let latest_day = authored.keys().map(|(_, _, day)| *day).max().unwrap_or(0);

            // user -> file -> decayed lines; days are visited in order per pair
            let mut knowledge: BTreeMap<u32, BTreeMap<u32, f64>> = BTreeMap::new();
            for ((user, file, day), lines) in &authored {
                let weight = *lines as f64 * self.decay(latest_day - day);
                *knowledge.entry(*user).or_default().entry(*file).or_insert(0.0) += weight;
            }

            let mut per_file: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
            for files in knowledge.values() {
                for (file, weight) in files {
                    per_file.entry(*file).or_default().push(*weight);
                }
            }
            let file_totals: BTreeMap<u32, f64> =
                per_file.into_iter().map(|(file, weights)| (file, stable_sum(weights))).collect();

            let mut file_owners: BTreeMap<u32, (f64, Vec<u32>)> = BTreeMap::new();
            for (user, files) in knowledge.iter_mut() {
                for (file, weight) in files.iter_mut() {
                    let total = file_totals.get(file).copied().unwrap_or(0.0);
                    *weight = if total > 0.0 { *weight / total } else { 0.0 };

                    let owners = file_owners.entry(*file).or_insert((*weight, Vec::new()));
                    if *weight > owners.0 {
                        *owners = (*weight, vec![*user]);
                    } else if *weight == owners.0 {
                        owners.1.push(*user);
                    }
                }
            }

            info!(
                "Ownership calculated: {} developers across {} files",
                knowledge.len(),
                file_totals.len()
            );
            OwnershipOutput {
                half_life_days: self.half_life_days,
                developer_knowledge: knowledge,
                file_owners: file_owners.into_iter().map(|(file, (_, users))| (file, users)).collect(),
            }
        });
    }

    fn output(&self) -> Option<&OwnershipOutput> {
        self.result.get()
    }
}
