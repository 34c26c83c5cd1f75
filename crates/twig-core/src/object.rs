//! Content-addressable object store.
//!
//! Objects live under `.twig/objects/<kind>/` using a 2-character prefix
//! directory scheme: id `abcdef...` is stored at `<kind>/ab/cdef...`.
//! Blobs are stored as raw bytes, commits as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::fsutil::{atomic_write, list_file_names, list_subdir_names};
use crate::hash::{blob_id, is_full_id};

/// The two kinds of stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Commit,
}

impl ObjectKind {
    /// Directory under `objects/` holding this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blobs",
            ObjectKind::Commit => "commits",
        }
    }
}

/// A stored object. Each variant carries its own encoding.
#[derive(Debug, Clone)]
pub enum Object {
    /// File content, addressed by `digest(name, content)`.
    Blob { name: String, content: Vec<u8> },
    Commit(Commit),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob { .. } => ObjectKind::Blob,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Object::Blob { name, content } => blob_id(name, content),
            Object::Commit(commit) => commit.id.clone(),
        }
    }

    fn encode(&self) -> TwigResult<Vec<u8>> {
        match self {
            Object::Blob { content, .. } => Ok(content.clone()),
            Object::Commit(commit) => Ok(serde_json::to_vec_pretty(commit)?),
        }
    }
}

/// The object store manages content-addressable storage on disk.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    /// Root path: `.twig/objects/`
    root: PathBuf,
}

impl ObjectStore {
    /// Create a new ObjectStore rooted at the given path.
    pub fn new(objects_dir: &Path) -> Self {
        Self {
            root: objects_dir.to_path_buf(),
        }
    }

    /// Create the per-kind directories.
    pub fn create_layout(&self) -> TwigResult<()> {
        for kind in [ObjectKind::Blob, ObjectKind::Commit] {
            fs::create_dir_all(self.root.join(kind.dir_name()))?;
        }
        Ok(())
    }

    /// Store an object and return its id.
    ///
    /// If an object with the same id already exists this is a no-op; stored
    /// objects are never overwritten.
    pub fn put(&self, object: &Object) -> TwigResult<String> {
        let id = object.id();
        let path = self.object_path(object.kind(), &id);
        if path.exists() {
            return Ok(id);
        }
        atomic_write(&path, &object.encode()?)?;
        debug!(kind = object.kind().dir_name(), id = %id, "stored object");
        Ok(id)
    }

    /// Store file content as a blob.
    pub fn put_blob(&self, name: &str, content: &[u8]) -> TwigResult<String> {
        self.put(&Object::Blob {
            name: name.to_string(),
            content: content.to_vec(),
        })
    }

    /// Store a commit.
    pub fn put_commit(&self, commit: &Commit) -> TwigResult<String> {
        self.put(&Object::Commit(commit.clone()))
    }

    /// Retrieve a blob's content.
    ///
    /// Blobs are only ever looked up through a commit or the stage, so a
    /// missing blob means the store is damaged.
    pub fn get_blob(&self, id: &str) -> TwigResult<Vec<u8>> {
        let path = self.object_path(ObjectKind::Blob, id);
        if !path.exists() {
            return Err(TwigError::Integrity(format!("missing blob {id}")));
        }
        Ok(fs::read(&path)?)
    }

    /// Retrieve a commit by its full id.
    pub fn get_commit(&self, id: &str) -> TwigResult<Commit> {
        if !is_full_id(id) {
            return Err(TwigError::CommitNotFound(id.to_string()));
        }
        let path = self.object_path(ObjectKind::Commit, id);
        if !path.exists() {
            return Err(TwigError::CommitNotFound(id.to_string()));
        }
        let data = fs::read(&path)?;
        let commit: Commit = serde_json::from_slice(&data)
            .map_err(|e| TwigError::Integrity(format!("unreadable commit {id}: {e}")))?;
        if commit.id != id || !commit.is_consistent() {
            return Err(TwigError::Integrity(format!(
                "commit {id} does not match its content"
            )));
        }
        Ok(commit)
    }

    /// Check if an object exists.
    pub fn contains(&self, kind: ObjectKind, id: &str) -> bool {
        is_full_id(id) && self.object_path(kind, id).exists()
    }

    /// Every stored commit id, sorted.
    pub fn commit_ids(&self) -> TwigResult<Vec<String>> {
        let dir = self.root.join(ObjectKind::Commit.dir_name());
        let mut ids = Vec::new();
        for prefix in list_subdir_names(&dir)? {
            for rest in list_file_names(&dir.join(&prefix))? {
                if rest.ends_with(".tmp") {
                    continue;
                }
                ids.push(format!("{prefix}{rest}"));
            }
        }
        Ok(ids)
    }

    /// Resolve a possibly-short commit id to a full one.
    ///
    /// Exactly one stored commit must start with `prefix`. No match and an
    /// ambiguous match both report `CommitNotFound`.
    pub fn resolve_short_id(&self, prefix: &str) -> TwigResult<String> {
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TwigError::CommitNotFound(prefix.to_string()));
        }
        let prefix = prefix.to_ascii_lowercase();
        if is_full_id(&prefix) {
            return if self.contains(ObjectKind::Commit, &prefix) {
                Ok(prefix)
            } else {
                Err(TwigError::CommitNotFound(prefix))
            };
        }

        let candidates = if prefix.len() >= 2 {
            let (dir, rest) = prefix.split_at(2);
            list_file_names(&self.root.join(ObjectKind::Commit.dir_name()).join(dir))?
                .into_iter()
                .filter(|name| name.starts_with(rest) && !name.ends_with(".tmp"))
                .map(|name| format!("{dir}{name}"))
                .collect::<Vec<_>>()
        } else {
            self.commit_ids()?
                .into_iter()
                .filter(|id| id.starts_with(&prefix))
                .collect()
        };

        match candidates.as_slice() {
            [only] => Ok(only.clone()),
            [] => Err(TwigError::CommitNotFound(prefix)),
            many => {
                debug!(prefix = %prefix, matches = many.len(), "ambiguous commit prefix");
                Err(TwigError::CommitNotFound(prefix))
            }
        }
    }

    /// Copy one object into `dst` if it is not there yet.
    ///
    /// Returns true if a copy was made.
    pub fn copy_to(&self, dst: &ObjectStore, kind: ObjectKind, id: &str) -> TwigResult<bool> {
        if dst.contains(kind, id) {
            return Ok(false);
        }
        let src_path = self.object_path(kind, id);
        if !src_path.exists() {
            return Err(TwigError::Integrity(format!(
                "missing {} object {id}",
                kind.dir_name()
            )));
        }
        let data = fs::read(&src_path)?;
        atomic_write(&dst.object_path(kind, id), &data)?;
        Ok(true)
    }

    /// Get the filesystem path for an object id.
    fn object_path(&self, kind: ObjectKind, id: &str) -> PathBuf {
        let (prefix, rest) = id.split_at(2.min(id.len()));
        self.root.join(kind.dir_name()).join(prefix).join(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::BlobMap;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> ObjectStore {
        let store = ObjectStore::new(dir);
        store.create_layout().unwrap();
        store
    }

    #[test]
    fn test_store_and_retrieve_blob() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let id = store.put_blob("hello.txt", b"hello world").unwrap();
        assert_eq!(store.get_blob(&id).unwrap(), b"hello world");
        assert!(dir
            .path()
            .join("blobs")
            .join(&id[..2])
            .join(&id[2..])
            .exists());
    }

    #[test]
    fn test_store_commit_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let commit = Commit::new("msg", vec![], BlobMap::new());
        let id = store.put_commit(&commit).unwrap();
        assert_eq!(id, commit.id);
        assert_eq!(store.get_commit(&id).unwrap(), commit);
    }

    #[test]
    fn test_missing_commit_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let id = Commit::initial().id;
        assert!(matches!(
            store.get_commit(&id),
            Err(TwigError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_missing_blob_is_integrity_error() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let id = blob_id("a", b"b");
        assert!(matches!(store.get_blob(&id), Err(TwigError::Integrity(_))));
    }

    #[test]
    fn test_corrupt_commit_is_integrity_error() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let commit = Commit::new("msg", vec![], BlobMap::new());
        store.put_commit(&commit).unwrap();
        let path = dir
            .path()
            .join("commits")
            .join(&commit.id[..2])
            .join(&commit.id[2..]);
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            store.get_commit(&commit.id),
            Err(TwigError::Integrity(_))
        ));
    }

    #[test]
    fn test_resolve_short_id() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let commit = Commit::new("msg", vec![], BlobMap::new());
        store.put_commit(&commit).unwrap();

        assert_eq!(store.resolve_short_id(&commit.id[..8]).unwrap(), commit.id);
        assert_eq!(store.resolve_short_id(&commit.id[..1]).unwrap(), commit.id);
        assert_eq!(store.resolve_short_id(&commit.id).unwrap(), commit.id);
        assert!(matches!(
            store.resolve_short_id("zz"),
            Err(TwigError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_ambiguous_prefix_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        // Two commits sharing a first character.
        let mut ids = Vec::new();
        for i in 0.. {
            let c = Commit::new(format!("m{i}"), vec![], BlobMap::new());
            if ids.iter().any(|id: &String| id[..1] == c.id[..1]) {
                store.put_commit(&c).unwrap();
                ids.push(c.id);
                break;
            }
            ids.push(c.id.clone());
            store.put_commit(&c).unwrap();
        }
        let shared = &ids.last().unwrap()[..1];
        assert!(matches!(
            store.resolve_short_id(shared),
            Err(TwigError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_commit_ids_lists_everything() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let a = Commit::new("a", vec![], BlobMap::new());
        let b = Commit::new("b", vec![a.id.clone()], BlobMap::new());
        store.put_commit(&a).unwrap();
        store.put_commit(&b).unwrap();
        store.put_blob("f", b"x").unwrap();

        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(store.commit_ids().unwrap(), expected);
    }

    #[test]
    fn test_copy_to_other_store() {
        let src_dir = tempdir().unwrap();
        let dst_dir = tempdir().unwrap();
        let src = store_in(src_dir.path());
        let dst = store_in(dst_dir.path());

        let id = src.put_blob("f", b"content").unwrap();
        assert!(src.copy_to(&dst, ObjectKind::Blob, &id).unwrap());
        assert!(!src.copy_to(&dst, ObjectKind::Blob, &id).unwrap());
        assert_eq!(dst.get_blob(&id).unwrap(), b"content");
    }

    proptest! {
        #[test]
        fn prop_put_twice_stores_once(body in proptest::collection::vec(any::<u8>(), 0..128)) {
            let dir = tempdir().unwrap();
            let store = store_in(dir.path());
            let h1 = store.put_blob("f", &body).unwrap();
            let h2 = store.put_blob("f", &body).unwrap();
            prop_assert_eq!(&h1, &h2);
            let files = list_file_names(&dir.path().join("blobs").join(&h1[..2])).unwrap();
            prop_assert_eq!(files.len(), 1);
        }
    }
}
