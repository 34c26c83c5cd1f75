//! Working directory status.
//!
//! Compares the current commit, the stage and the files on disk to decide
//! which paths are staged, modified without being staged, or untracked.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::commit::Commit;
use crate::error::TwigResult;
use crate::index::Stage;
use crate::worktree::WorkTree;

/// Why a path shows up under "not staged for commit".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unstaged {
    /// Working content differs from what is tracked or staged.
    Modified,
    /// File is gone from disk without a staged removal.
    Deleted,
}

/// A path with changes that are not staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnstagedChange {
    pub path: String,
    pub kind: Unstaged,
}

/// Full working directory status, every list sorted by path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Status {
    pub branches: Vec<String>,
    pub current_branch: String,
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub not_staged: Vec<UnstagedChange>,
    pub untracked: Vec<String>,
}

impl Status {
    /// True if nothing is staged, modified or untracked.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.not_staged.is_empty()
            && self.untracked.is_empty()
    }
}

/// Classify every path known to the commit, the stage or the disk.
pub fn compute_status(head: &Commit, stage: &Stage, tree: &WorkTree) -> TwigResult<Status> {
    let on_disk = tree.files()?;
    let mut not_staged = Vec::new();

    let mut candidates: BTreeSet<&str> = head.blobs.keys().map(String::as_str).collect();
    candidates.extend(stage.added.keys().map(String::as_str));

    for path in candidates {
        let working = if on_disk.contains(path) {
            tree.blob_id(path)?
        } else {
            None
        };
        let expected = match stage.added.get(path) {
            Some(staged) => Some(staged.as_str()),
            None if stage.is_staged_for_removal(path) => continue,
            None => head.blob(path),
        };
        match (expected, working.as_deref()) {
            (Some(_), None) => not_staged.push(UnstagedChange {
                path: path.to_string(),
                kind: Unstaged::Deleted,
            }),
            (Some(want), Some(have)) if want != have => not_staged.push(UnstagedChange {
                path: path.to_string(),
                kind: Unstaged::Modified,
            }),
            _ => {}
        }
    }

    let untracked = on_disk
        .iter()
        .filter(|path| {
            let known = head.tracks(path) || stage.is_staged_for_add(path);
            !known || stage.is_staged_for_removal(path)
        })
        .cloned()
        .collect();

    Ok(Status {
        branches: Vec::new(),
        current_branch: String::new(),
        staged: stage.added.keys().cloned().collect(),
        removed: stage.removed.keys().cloned().collect(),
        not_staged,
        untracked,
    })
}
