//! Coordination needs between developers
//!
//! Task assignment `TA` (developer x file edit counts) and file dependencies
//! `CR` (co-change counts, with every file depending on itself) give the
//! coordination requirement `CN = TA x CR x TA^T`. Only distinct developer
//! pairs are reported.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
use log::info;
use rayon::prelude::*;
use serde::Serialize;

use super::{Calculated, DataProcessor};

/// Files a developer touched in one mined commit pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitContribution {
    pub user: u32,
    pub files: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationNeed {
    pub first_user: u32,
    pub second_user: u32,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationOutput {
    pub needs: Vec<CoordinationNeed>,
}

#[derive(Debug, Default)]
pub struct CoordinationProcessor {
    assignment: DashMap<(u32, u32), u64>,
    dependency: DashMap<(u32, u32), u64>,
    result: Calculated<CoordinationOutput>,
}

impl CoordinationProcessor {
    pub fn new() -> Self {
        Self {
            assignment: DashMap::new(),
            dependency: DashMap::new(),
            result: Calculated::new(),
        }
    }
}

impl DataProcessor for CoordinationProcessor {
    type Fact = CommitContribution;
    type Output = CoordinationOutput;

    fn name(&self) -> &'static str {
        "coordination"
    }

    fn process_data(&self, fact: CommitContribution) {
        let files: BTreeSet<u32> = fact.files.into_iter().collect();
        let files: Vec<u32> = files.into_iter().collect();

        for file in &files {
            *self.assignment.entry((fact.user, *file)).or_insert(0) += 1;
        }
        for (i, first) in files.iter().enumerate() {
            for second in &files[i + 1..] {
                *self.dependency.entry((*first, *second)).or_insert(0) += 1;
            }
        }
    }

    fn calculate(&self) {
        self.result.finalize(self.name(), || {
            // TA: user -> file -> count
            let mut task_assignment: BTreeMap<u32, BTreeMap<u32, u64>> = BTreeMap::new();
            for entry in self.assignment.iter() {
                let (user, file) = *entry.key();
                task_assignment.entry(user).or_default().insert(file, *entry.value());
            }

            // CR: file -> dependent file -> count, symmetric, identity on the diagonal
            let mut requirements: BTreeMap<u32, BTreeMap<u32, u64>> = BTreeMap::new();
            for entry in self.dependency.iter() {
                let (first, second) = *entry.key();
                requirements.entry(first).or_default().insert(second, *entry.value());
                requirements.entry(second).or_default().insert(first, *entry.value());
            }
            for files in task_assignment.values() {
                for file in files.keys() {
                    requirements.entry(*file).or_default().insert(*file, 1);
                }
            }

            // TA x CR, per user: file -> weight
            let users: Vec<u32> = task_assignment.keys().copied().collect();
            let reach: BTreeMap<u32, BTreeMap<u32, u64>> = users
                .par_iter()
                .map(|user| {
                    let mut row: BTreeMap<u32, u64> = BTreeMap::new();
                    for (file, count) in &task_assignment[user] {
                        if let Some(dependents) = requirements.get(file) {
                            for (dependent, strength) in dependents {
                                *row.entry(*dependent).or_insert(0) += count * strength;
                            }
                        }
                    }
                    (*user, row)
                })
                .collect();

            // (TA x CR) x TA^T over distinct user pairs
            let mut needs: Vec<CoordinationNeed> = users
                .par_iter()
                .enumerate()
                .flat_map_iter(|(i, first)| {
                    let row = &reach[first];
                    let task_assignment = &task_assignment;
                    users[i + 1..].iter().filter_map(move |second| {
                        let weight: u64 = task_assignment[second]
                            .iter()
                            .map(|(file, count)| row.get(file).map(|w| w * count).unwrap_or(0))
                            .sum();
                        (weight > 0).then_some(CoordinationNeed {
                            first_user: *first,
                            second_user: *second,
                            weight,
                        })
                    })
                })
                .collect();
            needs.sort_by_key(|need| (need.first_user, need.second_user));

            info!(
                "Coordination needs calculated: {} developers, {} developer pairs",
                users.len(),
                needs.len()
            );
            CoordinationOutput { needs }
        });
    }

    fn output(&self) -> Option<&CoordinationOutput> {
        self.result.get()
    }
}
