//! Commit graph traversal.
//!
//! Commits form a DAG through their parent links. Merge commits have two
//! parents, so every traversal keeps a visited set keyed by commit id.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::object::ObjectStore;

/// Anything commits can be loaded from.
pub trait CommitSource {
    fn load_commit(&self, id: &str) -> TwigResult<Commit>;
}

impl CommitSource for ObjectStore {
    fn load_commit(&self, id: &str) -> TwigResult<Commit> {
        self.get_commit(id)
    }
}

/// Load a commit reached through a parent link; absence is corruption.
fn load_parent<S: CommitSource + ?Sized>(source: &S, id: &str) -> TwigResult<Commit> {
    source.load_commit(id).map_err(|e| match e {
        TwigError::CommitNotFound(id) => TwigError::Integrity(format!("missing parent commit {id}")),
        other => other,
    })
}

/// Ids of `start` and every commit reachable from it through any parent.
///
/// Fails with an integrity error if the reachable graph contains a cycle.
pub fn ancestors<S: CommitSource + ?Sized>(source: &S, start: &Commit) -> TwigResult<HashSet<String>> {
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    let mut queue = VecDeque::new();
    edges.insert(start.id.clone(), start.parents.clone());
    queue.extend(start.parents.iter().cloned());

    while let Some(id) = queue.pop_front() {
        if edges.contains_key(&id) {
            continue;
        }
        let commit = load_parent(source, &id)?;
        queue.extend(commit.parents.iter().cloned());
        edges.insert(id, commit.parents);
    }

    ensure_acyclic(&edges)?;
    debug!(start = %start.id, count = edges.len(), "collected ancestors");
    Ok(edges.into_keys().collect())
}

/// Kahn's algorithm over the collected parent edges.
fn ensure_acyclic(edges: &HashMap<String, Vec<String>>) -> TwigResult<()> {
    let mut children: HashMap<&str, usize> = edges.keys().map(|k| (k.as_str(), 0)).collect();
    for parents in edges.values() {
        for parent in parents {
            if let Some(n) = children.get_mut(parent.as_str()) {
                *n += 1;
            }
        }
    }

    let mut ready: Vec<&str> = children
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut seen = 0;
    while let Some(id) = ready.pop() {
        seen += 1;
        for parent in &edges[id] {
            if let Some(n) = children.get_mut(parent.as_str()) {
                *n -= 1;
                if *n == 0 {
                    ready.push(parent.as_str());
                }
            }
        }
    }

    if seen != edges.len() {
        return Err(TwigError::Integrity("cycle in commit graph".to_string()));
    }
    Ok(())
}

/// True if `ancestor_id` is `commit` or reachable from it.
pub fn is_ancestor<S: CommitSource + ?Sized>(
    source: &S,
    ancestor_id: &str,
    commit: &Commit,
) -> TwigResult<bool> {
    Ok(ancestors(source, commit)?.contains(ancestor_id))
}

/// The merge base used by `merge`.
///
/// Collects every ancestor of `a`, then walks breadth-first from `b` and
/// returns the first commit found in that set. When several merge bases
/// exist this is whichever the walk reaches first, not necessarily the
/// lowest one.
pub fn split_point<S: CommitSource + ?Sized>(source: &S, a: &Commit, b: &Commit) -> TwigResult<Commit> {
    if a.id == b.id {
        return Ok(a.clone());
    }
    let from_a = ancestors(source, a)?;

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(b.clone());
    visited.insert(b.id.clone());

    while let Some(commit) = queue.pop_front() {
        if from_a.contains(&commit.id) {
            debug!(a = %a.id, b = %b.id, split = %commit.id, "found split point");
            return Ok(commit);
        }
        for parent in &commit.parents {
            if visited.insert(parent.clone()) {
                queue.push_back(load_parent(source, parent)?);
            }
        }
    }

    Err(TwigError::Integrity(format!(
        "commits {} and {} share no history",
        a.id, b.id
    )))
}

/// `start` followed by its first-parent chain down to the root.
pub fn history_from<S: CommitSource + ?Sized>(source: &S, start: &Commit) -> TwigResult<Vec<Commit>> {
    let mut history = vec![start.clone()];
    let mut seen = HashSet::from([start.id.clone()]);
    let mut next = start.first_parent().map(String::from);

    while let Some(id) = next {
        if !seen.insert(id.clone()) {
            return Err(TwigError::Integrity(format!("cycle in history at {id}")));
        }
        let commit = load_parent(source, &id)?;
        next = commit.first_parent().map(String::from);
        history.push(commit);
    }
    Ok(history)
}

/// Every commit in the store, in id order.
pub fn all_commits(store: &ObjectStore) -> TwigResult<Vec<Commit>> {
    store
        .commit_ids()?
        .iter()
        .map(|id| store.get_commit(id))
        .collect()
}
