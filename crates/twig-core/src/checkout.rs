//! Materializing commits into the working directory.
//!
//! Checkout runs in two passes: [`plan_checkout`] validates against the
//! working tree and touches nothing; [`apply_checkout`] performs the writes
//! and deletions. A rejected plan leaves the directory exactly as it was.

use tracing::debug;

use crate::commit::{BlobMap, Commit};
use crate::error::{TwigError, TwigResult};
use crate::object::ObjectStore;
use crate::worktree::WorkTree;

/// The file operations that move the tree from one commit to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutPlan {
    /// Path -> blob id to write.
    pub writes: BlobMap,
    /// Tracked paths that the target does not have.
    pub deletes: Vec<String>,
}

/// Validate a switch from `current` to `target`.
///
/// Any file `current` does not track is an
/// [`TwigError::UntrackedFileConflict`] if writing `target` would touch it:
/// `target` tracks the same path, the file sits where `target` needs a
/// directory, or it lives inside a directory where `target` needs a file.
pub fn plan_checkout(current: &Commit, target: &Commit, tree: &WorkTree) -> TwigResult<CheckoutPlan> {
    let on_disk = tree.files()?;
    for path in &on_disk {
        if !current.tracks(path) && target.tracks(path) {
            return Err(TwigError::UntrackedFileConflict(path.clone()));
        }
    }

    for path in target.blobs.keys() {
        if let Some(blocker) = tree.file_ancestor(path) {
            if !current.tracks(&blocker) {
                return Err(TwigError::UntrackedFileConflict(blocker));
            }
        }
        if tree.is_dir(path) {
            // Deleting the tracked files inside prunes the directory; anything
            // else keeps it in place.
            let inside = format!("{path}/");
            let mut contents = on_disk.iter().filter(|f| f.starts_with(&inside)).peekable();
            if contents.peek().is_none() {
                return Err(TwigError::UntrackedFileConflict(path.clone()));
            }
            if let Some(stray) = contents.find(|f| !current.tracks(f)) {
                return Err(TwigError::UntrackedFileConflict(stray.clone()));
            }
        }
    }

    let deletes = current
        .blobs
        .keys()
        .filter(|path| !target.tracks(path))
        .cloned()
        .collect();

    Ok(CheckoutPlan {
        writes: target.blobs.clone(),
        deletes,
    })
}

/// Carry out a validated plan.
pub fn apply_checkout(plan: &CheckoutPlan, store: &ObjectStore, tree: &WorkTree) -> TwigResult<()> {
    for path in &plan.deletes {
        tree.delete(path)?;
    }
    for (path, blob) in &plan.writes {
        if tree.blob_id(path)?.as_deref() == Some(blob.as_str()) {
            continue;
        }
        tree.write(path, &store.get_blob(blob)?)?;
    }
    debug!(
        written = plan.writes.len(),
        deleted = plan.deletes.len(),
        "applied checkout"
    );
    Ok(())
}

/// Overwrite one working file with its version in `commit`.
pub fn checkout_path(path: &str, commit: &Commit, store: &ObjectStore, tree: &WorkTree) -> TwigResult<()> {
    let blob = commit
        .blob(path)
        .ok_or_else(|| TwigError::FileNotInCommit(path.to_string()))?;
    tree.write(path, &store.get_blob(blob)?)
}
