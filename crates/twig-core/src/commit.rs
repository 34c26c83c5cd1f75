//! Commits: immutable snapshots of the tracked file mapping.
//!
//! A commit records a message, a creation time, its parents, and the
//! mapping from repository-relative path to blob id. Its id is the digest of
//! exactly those fields, so two commits with identical fields are one object.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::digest;

/// Message of the root commit written by `init`.
pub const INITIAL_MESSAGE: &str = "initial commit";

/// Mapping from tracked path to blob id.
pub type BlobMap = BTreeMap<String, String>;

/// A commit, the unit of history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    /// Content digest of the remaining fields.
    pub id: String,
    /// Log message.
    pub message: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Parent ids: none for the root, two for a merge (current first).
    pub parents: Vec<String>,
    /// Tracked path -> blob id.
    pub blobs: BlobMap,
}

impl Commit {
    /// Create a commit stamped with the current time.
    pub fn new(message: impl Into<String>, parents: Vec<String>, blobs: BlobMap) -> Self {
        Self::at(message, Utc::now(), parents, blobs)
    }

    /// Create a commit with an explicit timestamp and compute its id.
    pub fn at(
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        parents: Vec<String>,
        blobs: BlobMap,
    ) -> Self {
        let mut commit = Commit {
            id: String::new(),
            message: message.into(),
            timestamp,
            parents,
            blobs,
        };
        commit.id = commit.compute_id();
        commit
    }

    /// The parentless commit every repository starts from.
    pub fn initial() -> Self {
        // The default DateTime<Utc> is the Unix epoch.
        Self::at(INITIAL_MESSAGE, DateTime::<Utc>::default(), Vec::new(), BlobMap::new())
    }

    /// Recompute the id from the commit's fields.
    pub fn compute_id(&self) -> String {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let parents = self.parents.join(",");
        let blobs: String = self
            .blobs
            .iter()
            .map(|(path, blob)| format!("{path}={blob};"))
            .collect();
        digest([
            self.message.as_bytes(),
            timestamp.as_bytes(),
            parents.as_bytes(),
            blobs.as_bytes(),
        ])
    }

    /// True if the stored id matches the fields.
    pub fn is_consistent(&self) -> bool {
        self.id == self.compute_id()
    }

    /// First parent, followed by `log`.
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Blob id tracked for `path`, if any.
    pub fn blob(&self, path: &str) -> Option<&str> {
        self.blobs.get(path).map(String::as_str)
    }

    pub fn tracks(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mapping(pairs: &[(&str, &str)]) -> BlobMap {
        pairs
            .iter()
            .map(|(p, b)| (p.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_id_is_pure_function_of_fields() {
        let ts = Utc.timestamp_opt(1_000, 0).unwrap();
        let a = Commit::at("msg", ts, vec!["p".into()], mapping(&[("f", "b1")]));
        let b = Commit::at("msg", ts, vec!["p".into()], mapping(&[("f", "b1")]));
        assert_eq!(a.id, b.id);
        assert!(a.is_consistent());
    }

    #[test]
    fn test_id_changes_with_mapping() {
        let ts = Utc.timestamp_opt(1_000, 0).unwrap();
        let a = Commit::at("msg", ts, vec![], mapping(&[("f", "b1")]));
        let b = Commit::at("msg", ts, vec![], mapping(&[("f", "b2")]));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_initial_commit_is_stable() {
        let a = Commit::initial();
        let b = Commit::initial();
        assert_eq!(a.id, b.id);
        assert!(a.parents.is_empty());
        assert!(a.blobs.is_empty());
        assert_eq!(a.message, INITIAL_MESSAGE);
        assert_eq!(a.timestamp.timestamp(), 0);
    }

    #[test]
    fn test_tampered_commit_is_inconsistent() {
        let mut c = Commit::new("msg", vec![], BlobMap::new());
        c.message = "other".into();
        assert!(!c.is_consistent());
    }

    #[test]
    fn test_json_round_trip_keeps_id_valid() {
        let c = Commit::new("msg", vec!["a".into(), "b".into()], mapping(&[("x", "1")]));
        let json = serde_json::to_string(&c).unwrap();
        let back: Commit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        assert!(back.is_consistent());
        assert!(back.is_merge());
        assert_eq!(back.first_parent(), Some("a"));
    }
}
