//! The stage (index): pending changes for the next commit.
//!
//! Two sides, each path -> blob id: files to add and files to remove. A
//! path is never on both sides at once. Stored as `.twig/index`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::commit::{BlobMap, Commit};
use crate::error::{TwigError, TwigResult};
use crate::fsutil::atomic_write;

/// What `record_remove` decided to do with a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Tracked by the commit: staged for removal; the working file should go.
    Untracked,
    /// Only staged for add: the pending add was dropped, the file stays.
    Unstaged,
}

/// Pending adds and removals.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    /// Path -> blob id to include at the next commit.
    pub added: BTreeMap<String, String>,
    /// Path -> blob id to drop at the next commit.
    pub removed: BTreeMap<String, String>,
}

impl Stage {
    /// Load the stage from disk, or return an empty one.
    pub fn load(path: &Path) -> TwigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        let stage: Stage = serde_json::from_str(&data)?;
        Ok(stage)
    }

    /// Save the stage (atomic: temp + fsync + rename).
    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    /// Stage `path` with content `blob_id` relative to `current`.
    ///
    /// Adding a file identical to the committed version cancels any pending
    /// add instead. Either way the path leaves the remove side.
    pub fn record_add(&mut self, path: &str, blob_id: &str, current: &Commit) {
        if current.blob(path) == Some(blob_id) {
            self.added.remove(path);
        } else {
            self.added.insert(path.to_string(), blob_id.to_string());
        }
        self.removed.remove(path);
    }

    /// Stage the removal of `path` relative to `current`.
    pub fn record_remove(&mut self, path: &str, current: &Commit) -> TwigResult<Removal> {
        if let Some(blob) = current.blob(path) {
            self.added.remove(path);
            self.removed.insert(path.to_string(), blob.to_string());
            Ok(Removal::Untracked)
        } else if self.added.remove(path).is_some() {
            Ok(Removal::Unstaged)
        } else {
            Err(TwigError::NothingToRemove(path.to_string()))
        }
    }

    /// Stage a path for removal without consulting a commit.
    pub(crate) fn stage_removal(&mut self, path: &str, blob_id: &str) {
        self.added.remove(path);
        self.removed.insert(path.to_string(), blob_id.to_string());
    }

    /// Stage a path for addition unconditionally.
    pub(crate) fn stage_addition(&mut self, path: &str, blob_id: &str) {
        self.removed.remove(path);
        self.added.insert(path.to_string(), blob_id.to_string());
    }

    /// The mapping the next commit would carry on top of `base`.
    pub fn snapshot(&self, base: &BlobMap) -> BlobMap {
        let mut blobs = base.clone();
        for (path, blob) in &self.added {
            blobs.insert(path.clone(), blob.clone());
        }
        for path in self.removed.keys() {
            blobs.remove(path);
        }
        blobs
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
    }

    pub fn is_staged_for_add(&self, path: &str) -> bool {
        self.added.contains_key(path)
    }

    pub fn is_staged_for_removal(&self, path: &str) -> bool {
        self.removed.contains_key(path)
    }
}
