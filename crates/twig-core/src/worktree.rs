//! The working directory as seen by twig.
//!
//! Paths handed to and returned from this module are repository-relative
//! and use `/` separators. The `.twig/` directory is never part of the tree.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{TwigError, TwigResult};
use crate::fsutil::remove_empty_dirs;
use crate::hash::blob_id;

/// File access rooted at the repository's working directory.
#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
    /// Name of the metadata directory to skip while walking.
    meta_dir: String,
}

impl WorkTree {
    pub fn new(root: &Path, meta_dir: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            meta_dir: meta_dir.to_string(),
        }
    }

    /// Normalize a user-supplied path to the repository-relative form.
    ///
    /// Rejects absolute paths and `..` components.
    pub fn normalize(&self, rel_path: &str) -> TwigResult<String> {
        let mut parts = Vec::new();
        for component in Path::new(rel_path).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(TwigError::PathTraversal(rel_path.to_string())),
            }
        }
        if parts.is_empty() || parts[0] == self.meta_dir {
            return Err(TwigError::PathTraversal(rel_path.to_string()));
        }
        Ok(parts.join("/"))
    }

    /// Every file below the root, excluding the metadata directory.
    pub fn files(&self) -> TwigResult<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == self.meta_dir.as_str()));
        for entry in walker {
            let entry = entry.map_err(|e| TwigError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.insert(parts.join("/"));
        }
        Ok(files)
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.abs(rel_path).is_file()
    }

    pub fn is_dir(&self, rel_path: &str) -> bool {
        self.abs(rel_path).is_dir()
    }

    /// Shortest proper prefix of `rel_path` that is a file on disk.
    ///
    /// Such a file stops `rel_path` from being written.
    pub fn file_ancestor(&self, rel_path: &str) -> Option<String> {
        rel_path
            .match_indices('/')
            .map(|(i, _)| &rel_path[..i])
            .find(|prefix| self.abs(prefix).is_file())
            .map(String::from)
    }

    pub fn read(&self, rel_path: &str) -> TwigResult<Vec<u8>> {
        Ok(fs::read(self.abs(rel_path))?)
    }

    /// Blob id the file would get if added now, or None if it is absent.
    pub fn blob_id(&self, rel_path: &str) -> TwigResult<Option<String>> {
        if !self.exists(rel_path) {
            return Ok(None);
        }
        let content = self.read(rel_path)?;
        Ok(Some(blob_id(rel_path, &content)))
    }

    /// Overwrite (or create) a working file.
    pub fn write(&self, rel_path: &str, content: &[u8]) -> TwigResult<()> {
        let path = self.abs(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }

    /// Delete a working file if present, pruning directories it leaves empty.
    pub fn delete(&self, rel_path: &str) -> TwigResult<()> {
        let path = self.abs(rel_path);
        if path.is_file() {
            fs::remove_file(&path)?;
        }
        if let Some(parent) = path.parent() {
            let _ = remove_empty_dirs(parent, &self.root);
        }
        Ok(())
    }

    fn abs(&self, rel_path: &str) -> PathBuf {
        self.root.join(rel_path)
    }
}
