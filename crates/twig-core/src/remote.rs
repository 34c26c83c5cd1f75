//! Remotes: other twig repositories on the same file system.
//!
//! A remote is the `.twig` directory of another repository. Push and fetch
//! copy the commits and blobs one side lacks and then move a single ref.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commit::Commit;
use crate::error::TwigResult;
use crate::fsutil::atomic_write;
use crate::graph::{self, CommitSource};
use crate::object::{ObjectKind, ObjectStore};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Repository configuration stored at `.twig/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Named remotes (e.g. "origin" -> path).
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteEntry>,
}

/// A single remote entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Path to the remote's `.twig` directory.
    pub path: String,
}

impl Config {
    /// Load the config, or return an empty one if the file is missing.
    pub fn load(path: &Path) -> TwigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        atomic_write(path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// Result of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushResult {
    pub remote: String,
    pub branch: String,
    pub commits_pushed: usize,
    pub blobs_pushed: usize,
    pub head: String,
}

/// Result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchResult {
    pub remote: String,
    pub branch: String,
    pub commits_fetched: usize,
    pub blobs_fetched: usize,
    pub head: String,
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

/// Counts of objects copied by [`transfer_history`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCount {
    pub commits: usize,
    pub blobs: usize,
}

/// Copy `tip` and every ancestor missing from `dst`, with their blobs.
///
/// Blobs are copied before the commit that references them, so `dst` never
/// holds a commit whose content is missing.
pub fn transfer_history(src: &ObjectStore, dst: &ObjectStore, tip: &Commit) -> TwigResult<TransferCount> {
    let mut count = TransferCount::default();
    let mut ids: Vec<String> = graph::ancestors(src, tip)?.into_iter().collect();
    ids.sort();

    for id in ids {
        if dst.contains(ObjectKind::Commit, &id) {
            continue;
        }
        let commit = src.load_commit(&id)?;
        for blob in commit.blobs.values() {
            if src.copy_to(dst, ObjectKind::Blob, blob)? {
                count.blobs += 1;
            }
        }
        if src.copy_to(dst, ObjectKind::Commit, &id)? {
            count.commits += 1;
        }
    }
    debug!(commits = count.commits, blobs = count.blobs, tip = %tip.id, "transferred history");
    Ok(count)
}
