//! Three-way merge decisions.
//!
//! For every path in the split point, the current commit or the target
//! commit, the three optional blob ids decide what happens to the path.
//! Planning is pure; the repository validates the plan against the working
//! tree and then applies it.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::commit::Commit;

/// Opening line of a conflict block.
pub const CONFLICT_START: &str = "<<<<<<< HEAD\n";
/// Separator between the current and target sides.
pub const CONFLICT_SEPARATOR: &str = "=======\n";
/// Closing line of a conflict block.
pub const CONFLICT_END: &str = ">>>>>>>\n";

/// What to do with one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum MergeAction {
    /// Check out the target's version and stage it.
    TakeTarget { blob: String },
    /// Delete the file and stage its removal.
    Delete { blob: String },
    /// Both sides changed the path differently.
    Conflict {
        current: Option<String>,
        target: Option<String>,
    },
}

/// Decide the action for a path given its blob id at the split point, in
/// the current commit and in the target commit. `None` means leave it.
pub fn classify(sp: Option<&str>, cur: Option<&str>, tgt: Option<&str>) -> Option<MergeAction> {
    let conflict = || MergeAction::Conflict {
        current: cur.map(String::from),
        target: tgt.map(String::from),
    };
    match (sp, cur, tgt) {
        (_, Some(c), Some(t)) if c == t => None,
        (Some(s), Some(c), Some(t)) => {
            if s == c {
                Some(MergeAction::TakeTarget { blob: t.to_string() })
            } else if s != t {
                Some(conflict())
            } else {
                None
            }
        }
        (None, Some(_), Some(_)) => Some(conflict()),
        (Some(s), Some(c), None) => {
            if s == c {
                Some(MergeAction::Delete { blob: c.to_string() })
            } else {
                Some(conflict())
            }
        }
        (Some(s), None, Some(t)) if s != t => Some(conflict()),
        (None, None, Some(t)) => Some(MergeAction::TakeTarget { blob: t.to_string() }),
        _ => None,
    }
}

/// Per-path actions for one merge, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    pub actions: BTreeMap<String, MergeAction>,
    /// Paths the current commit does not track but the merge writes to.
    pub needs_free_slot: BTreeSet<String>,
}

impl MergePlan {
    pub fn conflicts(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|(path, action)| match action {
            MergeAction::Conflict { .. } => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts().next().is_some()
    }
}

/// Plan a merge of `target` into `current` over `split`.
pub fn plan_merge(split: &Commit, current: &Commit, target: &Commit) -> MergePlan {
    let paths: BTreeSet<&String> = split
        .blobs
        .keys()
        .chain(current.blobs.keys())
        .chain(target.blobs.keys())
        .collect();

    let mut plan = MergePlan::default();
    for path in paths {
        let cur = current.blob(path);
        if let Some(action) = classify(split.blob(path), cur, target.blob(path)) {
            if cur.is_none() {
                plan.needs_free_slot.insert(path.clone());
            }
            plan.actions.insert(path.clone(), action);
        }
    }
    plan
}

/// Content written for a conflicted path. A missing side is empty.
pub fn conflict_content(current: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(current.len() + target.len() + 32);
    out.extend_from_slice(CONFLICT_START.as_bytes());
    out.extend_from_slice(current);
    out.extend_from_slice(CONFLICT_SEPARATOR.as_bytes());
    out.extend_from_slice(target);
    out.extend_from_slice(CONFLICT_END.as_bytes());
    out
}

/// Message of the commit that finalizes a merge.
pub fn merge_message(target_branch: &str, current_branch: &str) -> String {
    format!("Merged {target_branch} into {current_branch}.")
}

/// Result of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum MergeOutcome {
    /// The current branch was moved to the target commit.
    FastForward { commit: String },
    /// A two-parent commit was created.
    Merged {
        commit: String,
        conflicts: Vec<String>,
    },
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::BlobMap;

    fn take(b: &str) -> Option<MergeAction> {
        Some(MergeAction::TakeTarget { blob: b.into() })
    }

    fn conflict(c: Option<&str>, t: Option<&str>) -> Option<MergeAction> {
        Some(MergeAction::Conflict {
            current: c.map(String::from),
            target: t.map(String::from),
        })
    }

    #[test]
    fn test_classify_all_rows() {
        // modified only in target
        assert_eq!(classify(Some("s"), Some("s"), Some("t")), take("t"));
        // modified differently on both sides
        assert_eq!(classify(Some("s"), Some("c"), Some("t")), conflict(Some("c"), Some("t")));
        // modified the same way, or only in current
        assert_eq!(classify(Some("s"), Some("x"), Some("x")), None);
        assert_eq!(classify(Some("s"), Some("c"), Some("s")), None);
        // target deleted an unmodified file
        assert_eq!(
            classify(Some("s"), Some("s"), None),
            Some(MergeAction::Delete { blob: "s".into() })
        );
        // target deleted, current modified
        assert_eq!(classify(Some("s"), Some("c"), None), conflict(Some("c"), None));
        // current deleted, target modified
        assert_eq!(classify(Some("s"), None, Some("t")), conflict(None, Some("t")));
        // current deleted, target unchanged
        assert_eq!(classify(Some("s"), None, Some("s")), None);
        // both deleted
        assert_eq!(classify(Some("s"), None, None), None);
        // new in target only
        assert_eq!(classify(None, None, Some("t")), take("t"));
        // new on both sides
        assert_eq!(classify(None, Some("c"), Some("t")), conflict(Some("c"), Some("t")));
        assert_eq!(classify(None, Some("x"), Some("x")), None);
        // new in current only
        assert_eq!(classify(None, Some("c"), None), None);
    }

    fn commit(pairs: &[(&str, &str)]) -> Commit {
        let blobs: BlobMap = pairs
            .iter()
            .map(|(p, b)| (p.to_string(), b.to_string()))
            .collect();
        Commit::new("c", vec![], blobs)
    }

    #[test]
    fn test_plan_marks_paths_needing_free_slot() {
        let split = commit(&[("gone", "s")]);
        let current = commit(&[]);
        let target = commit(&[("gone", "t"), ("fresh", "f")]);

        let plan = plan_merge(&split, &current, &target);
        assert_eq!(plan.actions.len(), 2);
        assert!(plan.needs_free_slot.contains("gone"));
        assert!(plan.needs_free_slot.contains("fresh"));
        assert_eq!(plan.conflicts().collect::<Vec<_>>(), vec!["gone"]);
    }

    #[test]
    fn test_plan_without_changes_is_empty() {
        let c = commit(&[("a", "1")]);
        let plan = plan_merge(&c, &c, &c);
        assert!(plan.actions.is_empty());
        assert!(!plan.has_conflicts());
    }

    #[test]
    fn test_conflict_content_format() {
        assert_eq!(
            conflict_content(b"A\n", b"B\n"),
            b"<<<<<<< HEAD\nA\n=======\nB\n>>>>>>>\n".to_vec()
        );
        assert_eq!(
            conflict_content(b"", b"edited\n"),
            b"<<<<<<< HEAD\n=======\nedited\n>>>>>>>\n".to_vec()
        );
    }

    #[test]
    fn test_merge_message() {
        assert_eq!(merge_message("dev", "master"), "Merged dev into master.");
    }
}
