//! Repository Access
//!
//! The miners only see repositories through [`RepositoryAccess`]. Handles are
//! not shareable between threads, so the engine receives a [`RepositoryOpener`]
//! and every worker opens its own handle on first use.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use git2::{Delta, DiffFindOptions, DiffOptions, Oid, Patch, Repository, Sort};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MiningError, MiningResult};
use crate::metrics::{levenshtein, text_entropy};

/// Path git reports for the missing side of an added or deleted file
pub const DEV_NULL: &str = "/dev/null";

/// Recorded in place of the Levenshtein distance of hunks too large to compare
pub const LEVENSHTEIN_SKIPPED: u32 = u32::MAX;

/// A resolved branch reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchRef {
    /// Full reference name, e.g. `refs/remotes/origin/trunk`
    pub name: String,
    /// Short name, e.g. `origin/trunk`
    pub short_name: String,
    /// Commit the reference points at
    pub target: String,
}

/// A commit as seen by the miners
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    /// Author identity (email, or name when the email is empty)
    pub author: String,
    /// Commit time in seconds since the epoch
    pub timestamp: i64,
    pub message: String,
}

/// Change type of a single file in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Add,
    Modify,
    Delete,
    Rename,
}

impl ChangeType {
    fn from_delta(delta: Delta) -> Self {
        match delta {
            Delta::Added | Delta::Copied | Delta::Untracked => ChangeType::Add,
            Delta::Deleted => ChangeType::Delete,
            Delta::Renamed => ChangeType::Rename,
            _ => ChangeType::Modify,
        }
    }
}

/// One contiguous edit region of a file, with paths still as strings
#[derive(Debug, Clone, PartialEq)]
pub struct RawEdit {
    pub old_path: String,
    pub new_path: String,
    pub pre_start_line: u32,
    pub post_start_line: u32,
    pub pre_len_in_lines: u32,
    pub post_len_in_lines: u32,
    pub pre_len_in_chars: u32,
    pub post_len_in_chars: u32,
    pub pre_entropy: f64,
    pub post_entropy: f64,
    pub levenshtein: u32,
    pub change_type: ChangeType,
}

impl RawEdit {
    /// Build an edit from the removed (`pre_text`) and added (`post_text`) content.
    pub fn from_texts(
        old_path: impl Into<String>,
        new_path: impl Into<String>,
        change_type: ChangeType,
        (pre_start_line, pre_len_in_lines): (u32, u32),
        (post_start_line, post_len_in_lines): (u32, u32),
        pre_text: &str,
        post_text: &str,
    ) -> Self {
        Self {
            old_path: old_path.into(),
            new_path: new_path.into(),
            pre_start_line,
            post_start_line,
            pre_len_in_lines,
            post_len_in_lines,
            pre_len_in_chars: pre_text.chars().count() as u32,
            post_len_in_chars: post_text.chars().count() as u32,
            pre_entropy: text_entropy(pre_text),
            post_entropy: text_entropy(post_text),
            levenshtein: levenshtein(pre_text, post_text)
                .and_then(|distance| u32::try_from(distance).ok())
                .unwrap_or(LEVENSHTEIN_SKIPPED),
            change_type,
        }
    }

    /// Path the edit is attributed to: the new path unless the file was deleted.
    pub fn path(&self) -> &str {
        match self.change_type {
            ChangeType::Delete => &self.old_path,
            _ => &self.new_path,
        }
    }

    /// Added plus deleted lines
    pub fn modified_lines(&self) -> u32 {
        self.pre_len_in_lines + self.post_len_in_lines
    }
}

/// Read-only view of a repository used by the mining engine and the miners.
///
/// Implementations need not be `Send` or `Sync`.
pub trait RepositoryAccess {
    /// Resolve branch name patterns to references. Names matching nothing are skipped.
    fn list_branch_refs(&self, patterns: &[String]) -> MiningResult<Vec<BranchRef>>;

    /// Commits reachable from `branch`, newest first (oldest first when `reversed`).
    fn list_commits(&self, branch: &BranchRef, reversed: bool) -> MiningResult<Vec<Commit>>;

    /// Edits turning `older` into `newer`, in diff order.
    fn diff(&self, older: &Commit, newer: &Commit) -> MiningResult<Vec<RawEdit>>;

    /// Paths changed between `older` and `newer`.
    fn changed_files(&self, older: &Commit, newer: &Commit) -> MiningResult<BTreeSet<String>>;

    /// Edits introduced by `commit` against its first parent, or against the
    /// empty tree for a root commit.
    fn commit_diff(&self, commit: &Commit) -> MiningResult<Vec<RawEdit>>;

    /// Paths `commit` changed relative to its first parent (every path for a root commit).
    fn commit_changed_files(&self, commit: &Commit) -> MiningResult<BTreeSet<String>>;

    /// Whether the commit looks like a bug fix rather than a feature introduction.
    fn is_bug_fix(&self, commit: &Commit) -> bool {
        is_bug_fix_message(&commit.message)
    }
}

/// Creates thread-private repository handles
pub trait RepositoryOpener: Send + Sync {
    fn open(&self) -> MiningResult<Box<dyn RepositoryAccess>>;
}

/// Bug-fix classification by commit message keywords
pub fn is_bug_fix_message(message: &str) -> bool {
    static BUG_FIX: OnceLock<Regex> = OnceLock::new();
    BUG_FIX
        .get_or_init(|| {
            Regex::new(r"(?i)\b(fix(e[sd])?|bug(s|fix)?|hotfix|defect|fault|patch(ed)?)\b")
                .expect("bug-fix pattern is valid")
        })
        .is_match(message)
}

/// Check if the given path is a git repository
pub fn is_git_repository<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    match Repository::open(path) {
        Ok(_) => {
            debug!("Git repository detected at: {}", path.display());
            true
        }
        Err(e) => {
            debug!("Not a git repository at {}: {}", path.display(), e);
            false
        }
    }
}

/// Resolve the repository path from an optional argument, defaulting to the current directory
pub fn resolve_repository_path(repository_arg: Option<&str>) -> MiningResult<PathBuf> {
    let path = match repository_arg {
        Some(path) => PathBuf::from(path),
        None => {
            let current_dir = std::env::current_dir()?;
            info!("Using current directory as git repository: {}", current_dir.display());
            current_dir
        }
    };

    if !path.exists() {
        return Err(MiningError::repository(format!("Path does not exist: {}", path.display())));
    }
    if !is_git_repository(&path) {
        return Err(MiningError::repository(format!(
            "'{}' is not a git repository",
            path.display()
        )));
    }
    Ok(path.canonicalize().unwrap_or(path))
}

/// `git2`-backed repository access
pub struct GitRepository {
    repository: Repository,
    path: PathBuf,
}

impl GitRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> MiningResult<Self> {
        let path = path.as_ref();
        let repository = Repository::open(path).map_err(|e| {
            MiningError::repository(format!("Failed to open repository at {}: {}", path.display(), e))
        })?;
        Ok(Self {
            repository,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn find_commit(&self, commit: &Commit) -> MiningResult<git2::Commit<'_>> {
        let oid = Oid::from_str(&commit.hash)
            .map_err(|e| MiningError::job(format!("Malformed commit hash {}: {}", commit.hash, e)))?;
        Ok(self.repository.find_commit(oid)?)
    }

    fn pair_diff(&self, older: &Commit, newer: &Commit) -> MiningResult<git2::Diff<'_>> {
        let old_tree = self.find_commit(older)?.tree()?;
        let new_tree = self.find_commit(newer)?.tree()?;
        self.tree_diff(Some(&old_tree), &new_tree)
    }

    fn parent_diff(&self, commit: &Commit) -> MiningResult<git2::Diff<'_>> {
        let commit = self.find_commit(commit)?;
        let parent_tree = match commit.parent_count() {
            0 => None,
            _ => Some(commit.parent(0)?.tree()?),
        };
        self.tree_diff(parent_tree.as_ref(), &commit.tree()?)
    }

    fn tree_diff(&self, old_tree: Option<&git2::Tree<'_>>, new_tree: &git2::Tree<'_>) -> MiningResult<git2::Diff<'_>> {
        let mut options = DiffOptions::new();
        options.context_lines(0).ignore_filemode(true);
        let mut diff = self
            .repository
            .diff_tree_to_tree(old_tree, Some(new_tree), Some(&mut options))?;

        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;
        Ok(diff)
    }

    fn head_ref(&self) -> MiningResult<BranchRef> {
        let head = self
            .repository
            .head()
            .map_err(|e| MiningError::branch_resolution(format!("Failed to read HEAD: {}", e)))?;
        let target = head
            .peel_to_commit()
            .map_err(|e| MiningError::branch_resolution(format!("HEAD does not point at a commit: {}", e)))?
            .id()
            .to_string();
        Ok(BranchRef {
            name: head.name().unwrap_or("HEAD").to_string(),
            short_name: head.shorthand().unwrap_or("HEAD").to_string(),
            target,
        })
    }
}

fn pattern_matches(pattern: &str, branch: &BranchRef) -> bool {
    if pattern == branch.name || pattern == branch.short_name {
        return true;
    }
    if !pattern.contains('*') {
        return false;
    }
    let expression = format!(
        "^{}$",
        pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*")
    );
    Regex::new(&expression)
        .map(|re| re.is_match(&branch.short_name) || re.is_match(&branch.name))
        .unwrap_or(false)
}

impl RepositoryAccess for GitRepository {
    fn list_branch_refs(&self, patterns: &[String]) -> MiningResult<Vec<BranchRef>> {
        if patterns.is_empty() {
            return Ok(vec![self.head_ref()?]);
        }

        let branches = self
            .repository
            .branches(None)
            .map_err(|e| MiningError::branch_resolution(format!("Failed to list branches: {}", e)))?;

        let mut available = BTreeSet::new();
        for branch in branches {
            let (branch, _) = branch.map_err(|e| MiningError::branch_resolution(e.to_string()))?;
            let reference = branch.get();
            let Some(name) = reference.name() else { continue };
            let resolved = reference
                .resolve()
                .map_err(|e| MiningError::branch_resolution(format!("Failed to resolve {}: {}", name, e)))?;
            let Some(target) = resolved.target() else { continue };
            available.insert(BranchRef {
                name: name.to_string(),
                short_name: reference.shorthand().unwrap_or(name).to_string(),
                target: target.to_string(),
            });
        }

        let mut resolved = BTreeSet::new();
        for pattern in patterns {
            let matched: Vec<_> = available.iter().filter(|b| pattern_matches(pattern, b)).cloned().collect();
            if matched.is_empty() {
                warn!("Branch '{}' matches nothing in {}", pattern, self.path.display());
            }
            resolved.extend(matched);
        }
        Ok(resolved.into_iter().collect())
    }

    fn list_commits(&self, branch: &BranchRef, reversed: bool) -> MiningResult<Vec<Commit>> {
        let resolution = |e: git2::Error| {
            MiningError::branch_resolution(format!("Failed to walk {}: {}", branch.short_name, e))
        };

        let target = Oid::from_str(&branch.target).map_err(resolution)?;
        let mut walk = self.repository.revwalk().map_err(resolution)?;
        walk.push(target).map_err(resolution)?;
        let sorting = if reversed { Sort::TIME | Sort::REVERSE } else { Sort::TIME };
        walk.set_sorting(sorting).map_err(resolution)?;

        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid.map_err(resolution)?;
            let commit = self.repository.find_commit(oid).map_err(resolution)?;
            let author = commit.author();
            let identity = match author.email() {
                Some(email) if !email.is_empty() => email.to_string(),
                _ => author.name().unwrap_or("unknown").to_string(),
            };
            commits.push(Commit {
                hash: oid.to_string(),
                author: identity,
                timestamp: commit.time().seconds(),
                message: commit.message().unwrap_or("").to_string(),
            });
        }
        Ok(commits)
    }

    fn diff(&self, older: &Commit, newer: &Commit) -> MiningResult<Vec<RawEdit>> {
        diff_edits(&self.pair_diff(older, newer)?)
    }

    fn changed_files(&self, older: &Commit, newer: &Commit) -> MiningResult<BTreeSet<String>> {
        Ok(diff_paths(&self.pair_diff(older, newer)?))
    }

    fn commit_diff(&self, commit: &Commit) -> MiningResult<Vec<RawEdit>> {
        diff_edits(&self.parent_diff(commit)?)
    }

    fn commit_changed_files(&self, commit: &Commit) -> MiningResult<BTreeSet<String>> {
        Ok(diff_paths(&self.parent_diff(commit)?))
    }
}

/// Hunk-level edits of `diff`, in diff order
fn diff_edits(diff: &git2::Diff<'_>) -> MiningResult<Vec<RawEdit>> {
    let mut edits = Vec::new();

    for index in 0..diff.deltas().len() {
        // Binary files have no patch
        let Some(patch) = Patch::from_diff(diff, index)? else { continue };
        let delta = patch.delta();
        let change_type = ChangeType::from_delta(delta.status());
        let old_path = match change_type {
            ChangeType::Add => DEV_NULL.to_string(),
            _ => path_string(delta.old_file().path()),
        };
        let new_path = match change_type {
            ChangeType::Delete => DEV_NULL.to_string(),
            _ => path_string(delta.new_file().path()),
        };

        for hunk_index in 0..patch.num_hunks() {
            let (hunk, line_count) = patch.hunk(hunk_index)?;
            let mut pre_text = String::new();
            let mut post_text = String::new();
            for line_index in 0..line_count {
                let line = patch.line_in_hunk(hunk_index, line_index)?;
                let content = String::from_utf8_lossy(line.content());
                match line.origin() {
                    '-' => pre_text.push_str(&content),
                    '+' => post_text.push_str(&content),
                    _ => {}
                }
            }

            edits.push(RawEdit::from_texts(
                old_path.clone(),
                new_path.clone(),
                change_type,
                (hunk.old_start(), hunk.old_lines()),
                (hunk.new_start(), hunk.new_lines()),
                &pre_text,
                &post_text,
            ));
        }
    }
    Ok(edits)
}

fn diff_paths(diff: &git2::Diff<'_>) -> BTreeSet<String> {
    diff.deltas()
        .map(|delta| match delta.status() {
            Delta::Deleted => path_string(delta.old_file().path()),
            _ => path_string(delta.new_file().path()),
        })
        .collect()
}

fn path_string(path: Option<&Path>) -> String {
    path.map(|p| p.to_string_lossy().replace('\\', "/")).unwrap_or_default()
}

/// Opens a [`GitRepository`] at a fixed path
#[derive(Debug, Clone)]
pub struct GitOpener {
    path: PathBuf,
}

impl GitOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RepositoryOpener for GitOpener {
    fn open(&self) -> MiningResult<Box<dyn RepositoryAccess>> {
        Ok(Box::new(GitRepository::open(&self.path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(name: &str, short_name: &str) -> BranchRef {
        BranchRef {
            name: name.to_string(),
            short_name: short_name.to_string(),
            target: "0".repeat(40),
        }
    }

    #[test]
    fn test_bug_fix_classification() {
        assert!(is_bug_fix_message("Fix crash on empty input"));
        assert!(is_bug_fix_message("fixes #42"));
        assert!(is_bug_fix_message("hotfix: release build"));
        assert!(is_bug_fix_message("Resolve bug in parser"));
        assert!(!is_bug_fix_message("Add ownership miner"));
        assert!(!is_bug_fix_message("Prefix paths with repository root"));
    }

    #[test]
    fn test_pattern_matching() {
        let trunk = branch("refs/remotes/origin/trunk", "origin/trunk");
        assert!(pattern_matches("origin/trunk", &trunk));
        assert!(pattern_matches("refs/remotes/origin/trunk", &trunk));
        assert!(pattern_matches("origin/*", &trunk));
        assert!(!pattern_matches("trunk", &trunk));
        assert!(!pattern_matches("release/*", &trunk));
    }

    #[test]
    fn test_raw_edit_metrics() {
        let edit = RawEdit::from_texts(
            "a.txt",
            "a.txt",
            ChangeType::Modify,
            (1, 2),
            (1, 3),
            "ab\ncd\n",
            "ab\ncd\nef\n",
        );
        assert_eq!(edit.modified_lines(), 5);
        assert_eq!(edit.pre_len_in_chars, 6);
        assert_eq!(edit.post_len_in_chars, 9);
        assert_eq!(edit.levenshtein, 3);
        assert_eq!(edit.path(), "a.txt");
    }

    #[test]
    fn test_oversized_hunks_record_skipped_distance() {
        let pre = "a".repeat(crate::metrics::MAX_LEVENSHTEIN_CHARS + 1);
        let edit = RawEdit::from_texts("app.min.js", "app.min.js", ChangeType::Modify, (1, 1), (1, 1), &pre, "b");
        assert_eq!(edit.levenshtein, LEVENSHTEIN_SKIPPED);
        assert_eq!(edit.pre_len_in_chars as usize, pre.len());
    }

    #[test]
    fn test_deleted_edit_uses_old_path() {
        let edit = RawEdit::from_texts("gone.rs", DEV_NULL, ChangeType::Delete, (1, 1), (0, 0), "x\n", "");
        assert_eq!(edit.path(), "gone.rs");
        assert_eq!(edit.modified_lines(), 1);
    }
}
