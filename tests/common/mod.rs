//! Shared fixtures: throwaway git repositories with fully controlled history

#![allow(dead_code)]

use git2::{Oid, Repository, Signature, Time};
use std::path::Path;
use tempfile::TempDir;

pub const MAIN: &str = "main";

/// One day in seconds
pub const DAY: i64 = 86_400;

/// 2024-01-01T00:00:00Z
pub const START: i64 = 1_704_067_200;

pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    /// An empty repository whose HEAD points at the unborn `main` branch
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init test repository");
        repo.set_head(&format!("refs/heads/{}", MAIN)).expect("Failed to point HEAD at main");
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit a complete snapshot of top-level `files` on `branch`, on top of
    /// the branch's current tip. Returns the new commit hash.
    pub fn commit(&self, branch: &str, email: &str, time: i64, message: &str, files: &[(&str, &str)]) -> String {
        let parents: Vec<_> = self.tip(branch).into_iter().collect();
        self.write(branch, &parents, email, time, message, files)
    }

    /// Commit a snapshot on `branch` whose parents are the tips of `branch`
    /// and `other`, in that order
    pub fn merge(
        &self,
        branch: &str,
        other: &str,
        email: &str,
        time: i64,
        message: &str,
        files: &[(&str, &str)],
    ) -> String {
        let parents: Vec<_> = [branch, other]
            .iter()
            .map(|name| self.tip(name).expect("Merged branch has no commits"))
            .collect();
        self.write(branch, &parents, email, time, message, files)
    }

    fn tip(&self, branch: &str) -> Option<git2::Commit<'_>> {
        self.repo
            .refname_to_id(&format!("refs/heads/{}", branch))
            .ok()
            .map(|id| self.repo.find_commit(id).expect("Failed to find branch tip"))
    }

    fn write(
        &self,
        branch: &str,
        parents: &[git2::Commit<'_>],
        email: &str,
        time: i64,
        message: &str,
        files: &[(&str, &str)],
    ) -> String {
        let mut builder = self.repo.treebuilder(None).expect("Failed to create tree builder");
        for (path, content) in files {
            let blob = self.repo.blob(content.as_bytes()).expect("Failed to write blob");
            builder.insert(*path, blob, 0o100644).expect("Failed to insert blob");
        }
        let tree_id = builder.write().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let name = email.split('@').next().unwrap_or(email);
        let signature = Signature::new(name, email, &Time::new(time, 0)).expect("Failed to create signature");

        let reference = format!("refs/heads/{}", branch);
        let parents: Vec<&git2::Commit<'_>> = parents.iter().collect();
        let oid = self
            .repo
            .commit(Some(&reference), &signature, &signature, message, &tree, &parents)
            .expect("Failed to commit");
        oid.to_string()
    }

    /// Create `branch` pointing at `commit`
    pub fn branch(&self, branch: &str, commit: &str) {
        let commit = self
            .repo
            .find_commit(Oid::from_str(commit).expect("Malformed hash"))
            .expect("Failed to find commit");
        self.repo.branch(branch, &commit, false).expect("Failed to create branch");
    }
}

/// Lines `first..=last`, one number per line
pub fn numbered(first: u32, last: u32) -> String {
    (first..=last).map(|n| format!("{}\n", n)).collect()
}
