//! Co-edit networks
//!
//! Keeps every mined commit pair together with its edit-level detail and
//! derives, per pair of files, how many mined commit pairs edited both.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use serde::Serialize;

use super::{Calculated, DataProcessor};
use crate::git::ChangeType;

/// Commit reference with ids in place of strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfoEncoded {
    pub commit_id: u32,
    pub user_id: u32,
    /// Commit time in seconds since the epoch
    pub date: i64,
}

/// One edit region with path ids
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditData {
    pub old_path_id: u32,
    pub new_path_id: u32,
    pub pre_start_line_num: u32,
    pub post_start_line_num: u32,
    pub pre_len_in_lines: u32,
    pub post_len_in_lines: u32,
    pub pre_len_in_chars: u32,
    pub post_len_in_chars: u32,
    pub pre_entropy: f64,
    pub post_entropy: f64,
    pub levenshtein: u32,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
}

impl EditData {
    /// File the edit belongs to: the new path unless the file was deleted
    pub fn file_id(&self) -> u32 {
        match self.change_type {
            ChangeType::Delete => self.old_path_id,
            _ => self.new_path_id,
        }
    }
}

/// All edits between two compared commits
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitCoEdits {
    /// The older commit of the pair
    pub prev_commit_info: CommitInfoEncoded,
    /// The newer commit of the pair
    pub commit_info: CommitInfoEncoded,
    /// The commit after the newer one on the mined branch; absent at the tip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_commit_info: Option<CommitInfoEncoded>,
    pub edits: Vec<EditData>,
}

/// Number of mined commit pairs editing both files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAdjacency {
    pub first_file: u32,
    pub second_file: u32,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoEditOutput {
    pub co_edits: Vec<CommitCoEdits>,
    pub adjacency: Vec<FileAdjacency>,
}

#[derive(Debug, Default)]
pub struct CoEditProcessor {
    co_edits: Mutex<Vec<CommitCoEdits>>,
    adjacency: DashMap<(u32, u32), u64>,
    result: Calculated<CoEditOutput>,
}

impl CoEditProcessor {
    pub fn new() -> Self {
        Self {
            co_edits: Mutex::new(Vec::new()),
            adjacency: DashMap::new(),
            result: Calculated::new(),
        }
    }
}

impl DataProcessor for CoEditProcessor {
    type Fact = CommitCoEdits;
    type Output = CoEditOutput;

    fn name(&self) -> &'static str {
        "co-edit"
    }

    fn process_data(&self, fact: CommitCoEdits) {
        if fact.edits.is_empty() {
            return;
        }

        let files: BTreeSet<u32> = fact.edits.iter().map(EditData::file_id).collect();
        let files: Vec<u32> = files.into_iter().collect();
        for (i, first) in files.iter().enumerate() {
            for second in &files[i + 1..] {
                *self.adjacency.entry((*first, *second)).or_insert(0) += 1;
            }
        }

        self.co_edits.lock().push(fact);
    }

    fn calculate(&self) {
        self.result.finalize(self.name(), || {
            let mut co_edits = std::mem::take(&mut *self.co_edits.lock());
            co_edits.sort_by_key(|record| {
                (
                    record.commit_info.date,
                    record.prev_commit_info.date,
                    record.commit_info.commit_id,
                    record.prev_commit_info.commit_id,
                )
            });

            let adjacency: BTreeMap<(u32, u32), u64> =
                self.adjacency.iter().map(|entry| (*entry.key(), *entry.value())).collect();
            let adjacency: Vec<FileAdjacency> = adjacency
                .into_iter()
                .map(|((first_file, second_file), weight)| FileAdjacency {
                    first_file,
                    second_file,
                    weight,
                })
                .collect();

            info!(
                "Co-edits calculated: {} commit pairs, {} file adjacencies",
                co_edits.len(),
                adjacency.len()
            );
            CoEditOutput { co_edits, adjacency }
        });
    }

    fn output(&self) -> Option<&CoEditOutput> {
        self.result.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(commit_id: u32, date: i64) -> CommitInfoEncoded {
        CommitInfoEncoded { commit_id, user_id: 0, date }
    }

    fn edit(old_path_id: u32, new_path_id: u32, change_type: ChangeType) -> EditData {
        EditData {
            old_path_id,
            new_path_id,
            pre_start_line_num: 1,
            post_start_line_num: 1,
            pre_len_in_lines: 1,
            post_len_in_lines: 1,
            pre_len_in_chars: 4,
            post_len_in_chars: 5,
            pre_entropy: 1.5,
            post_entropy: 2.0,
            levenshtein: 1,
            change_type,
        }
    }

    #[test]
    fn test_adjacency_counts_distinct_files_once_per_pair() {
        let processor = CoEditProcessor::new();
        processor.process_data(CommitCoEdits {
            prev_commit_info: info(0, 10),
            commit_info: info(1, 20),
            next_commit_info: None,
            edits: vec![
                edit(5, 5, ChangeType::Modify),
                edit(5, 5, ChangeType::Modify),
                edit(7, 7, ChangeType::Modify),
            ],
        });
        processor.process_data(CommitCoEdits {
            prev_commit_info: info(1, 20),
            commit_info: info(2, 30),
            next_commit_info: None,
            edits: vec![edit(7, 7, ChangeType::Modify), edit(5, 9, ChangeType::Delete)],
        });
        processor.calculate();

        let output = processor.output().unwrap();
        assert_eq!(output.adjacency, vec![FileAdjacency { first_file: 5, second_file: 7, weight: 2 }]);
    }

    #[test]
    fn test_records_sorted_chronologically() {
        let processor = CoEditProcessor::new();
        processor.process_data(CommitCoEdits {
            prev_commit_info: info(1, 20),
            commit_info: info(2, 30),
            next_commit_info: None,
            edits: vec![edit(1, 1, ChangeType::Add)],
        });
        processor.process_data(CommitCoEdits {
            prev_commit_info: info(0, 10),
            commit_info: info(1, 20),
            next_commit_info: None,
            edits: vec![edit(1, 1, ChangeType::Modify)],
        });
        processor.process_data(CommitCoEdits {
            prev_commit_info: info(2, 30),
            commit_info: info(3, 40),
            next_commit_info: None,
            edits: vec![],
        });
        processor.calculate();

        let dates: Vec<i64> = processor.output().unwrap().co_edits.iter().map(|r| r.commit_info.date).collect();
        assert_eq!(dates, vec![20, 30]);
    }

    #[test]
    fn test_next_commit_is_serialized_when_known() {
        let mut record = CommitCoEdits {
            prev_commit_info: info(0, 10),
            commit_info: info(1, 20),
            next_commit_info: None,
            edits: vec![edit(1, 1, ChangeType::Modify)],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("nextCommitInfo"));

        record.next_commit_info = Some(info(2, 30));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""nextCommitInfo":{"commitId":2,"userId":0,"date":30}"#));
    }

    #[test]
    fn test_edit_serializes_type_tag() {
        let json = serde_json::to_string(&edit(1, 2, ChangeType::Rename)).unwrap();
        assert!(json.contains(r#""type":"RENAME""#));
        assert!(json.contains(r#""oldPathId":1"#));
    }
}
