//! Co-edit miner

use super::expect_pair;
use crate::engine::{Miner, MiningContext, MiningMode, WorkUnit};
use crate::error::MiningResult;
use crate::git::Commit;
use crate::processors::{CoEditProcessor, CommitCoEdits, CommitInfoEncoded, DataProcessor, EditData};
use crate::registry::Mappers;

#[derive(Debug, Clone, Default)]
pub struct CoEditMiner;

impl CoEditMiner {
    pub fn new() -> Self {
        Self
    }
}

fn encode(mappers: &Mappers, commit: &Commit) -> CommitInfoEncoded {
    CommitInfoEncoded {
        commit_id: mappers.commits.add(&commit.hash),
        user_id: mappers.users.add(&commit.author),
        date: commit.timestamp,
    }
}

impl Miner for CoEditMiner {
    type Processor = CoEditProcessor;

    fn name(&self) -> &'static str {
        "co-edit"
    }

    fn mode(&self) -> MiningMode {
        MiningMode::Pairwise
    }

    fn process(&self, context: &MiningContext<'_>, unit: &WorkUnit, processor: &CoEditProcessor) -> MiningResult<()> {
        let (older, newer) = expect_pair(self.name(), unit)?;
        let next = match unit {
            WorkUnit::Pair { next, .. } => next.as_ref(),
            WorkUnit::Periodized { .. } => None,
        };
        let files = &context.mappers.files;

        let edits = context
            .repository
            .diff(older, newer)?
            .into_iter()
            .map(|edit| EditData {
                old_path_id: files.add(&edit.old_path),
                new_path_id: files.add(&edit.new_path),
                pre_start_line_num: edit.pre_start_line,
                post_start_line_num: edit.post_start_line,
                pre_len_in_lines: edit.pre_len_in_lines,
                post_len_in_lines: edit.post_len_in_lines,
                pre_len_in_chars: edit.pre_len_in_chars,
                post_len_in_chars: edit.post_len_in_chars,
                pre_entropy: edit.pre_entropy,
                post_entropy: edit.post_entropy,
                levenshtein: edit.levenshtein,
                change_type: edit.change_type,
            })
            .collect();

        processor.process_data(CommitCoEdits {
            prev_commit_info: encode(context.mappers, older),
            commit_info: encode(context.mappers, newer),
            next_commit_info: next.map(|next| encode(context.mappers, next)),
            edits,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{ChangeType, RawEdit, DEV_NULL};
    use crate::miners::testing::{commit, FakeRepository};

    #[test]
    fn test_edits_are_encoded() {
        let older = commit("c1", "alice@example.com", 100, "Start");
        let newer = commit("c0", "bob@example.com", 200, "Split module");
        let repository = FakeRepository::default().with_diff(
            &older,
            &newer,
            vec![
                RawEdit::from_texts("lib.rs", "lib.rs", ChangeType::Modify, (3, 1), (3, 1), "a\n", "b\n"),
                RawEdit::from_texts(DEV_NULL, "util.rs", ChangeType::Add, (0, 0), (1, 1), "", "fn f() {}\n"),
            ],
        );
        let mappers = Mappers::new();
        let context = MiningContext {
            repository: &repository,
            mappers: &mappers,
        };
        let processor = CoEditProcessor::new();
        let unit = WorkUnit::Pair {
            older,
            newer,
            next: Some(commit("c9", "carol@example.com", 300, "Follow up")),
        };

        CoEditMiner::new().process(&context, &unit, &processor).unwrap();
        processor.calculate();

        let output = processor.output().unwrap();
        assert_eq!(output.co_edits.len(), 1);
        let record = &output.co_edits[0];
        assert_eq!(mappers.commit_hash(record.prev_commit_info.commit_id), "c1");
        assert_eq!(mappers.user_name(record.commit_info.user_id), "bob@example.com");
        assert_eq!(record.commit_info.date, 200);
        let next = record.next_commit_info.unwrap();
        assert_eq!(mappers.commit_hash(next.commit_id), "c9");
        assert_eq!(mappers.user_name(next.user_id), "carol@example.com");

        let added = &record.edits[1];
        assert_eq!(mappers.file_path(added.file_id()), "util.rs");
        assert_eq!(mappers.file_path(added.old_path_id), DEV_NULL);
        assert_eq!(added.levenshtein, 10);

        let lib = mappers.files.lookup_id("lib.rs").unwrap();
        let util = mappers.files.lookup_id("util.rs").unwrap();
        assert_eq!(output.adjacency.len(), 1);
        assert_eq!(
            (output.adjacency[0].first_file, output.adjacency[0].second_file),
            (lib.min(util), lib.max(util))
        );
    }
}
