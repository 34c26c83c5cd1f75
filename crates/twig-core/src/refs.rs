//! Branch refs and HEAD.
//!
//! Local branches live at `refs/heads/<name>`, remote-tracking branches at
//! `refs/remotes/<remote>/<name>`. Each file holds a commit id. HEAD holds
//! `ref: refs/heads/<name>`; there is no detached state.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{TwigError, TwigResult};
use crate::fsutil::{atomic_write, list_file_names};

const HEAD_PREFIX: &str = "ref: refs/heads/";

/// Named pointers into the commit graph.
#[derive(Debug, Clone)]
pub struct RefStore {
    /// The `.twig/` directory.
    dir: PathBuf,
}

impl RefStore {
    pub fn new(twig_dir: &Path) -> Self {
        Self {
            dir: twig_dir.to_path_buf(),
        }
    }

    /// Create the ref directories.
    pub fn create_layout(&self) -> TwigResult<()> {
        fs::create_dir_all(self.heads_dir())?;
        fs::create_dir_all(self.dir.join("refs").join("remotes"))?;
        Ok(())
    }

    /// Check a name for use as a branch or remote name.
    pub fn validate_name(name: &str) -> TwigResult<()> {
        let bad = name.is_empty()
            || name == "."
            || name.contains("..")
            || name.contains('/')
            || name.contains('\\')
            || name.ends_with(".tmp")
            || name.chars().any(|c| c.is_whitespace() || c.is_control());
        if bad {
            return Err(TwigError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Create a new local branch.
    pub fn create_branch(&self, name: &str, commit_id: &str) -> TwigResult<()> {
        Self::validate_name(name)?;
        if self.branch_path(name).exists() {
            return Err(TwigError::BranchExists(name.to_string()));
        }
        self.update_branch(name, commit_id)
    }

    /// Delete a local branch pointer. Its commits stay.
    pub fn delete_branch(&self, name: &str) -> TwigResult<()> {
        if Self::validate_name(name).is_err() || !self.branch_path(name).exists() {
            return Err(TwigError::BranchNotFound(name.to_string()));
        }
        if self.current_branch()? == name {
            return Err(TwigError::CannotDeleteCurrent);
        }
        fs::remove_file(self.branch_path(name))?;
        debug!(branch = name, "deleted branch");
        Ok(())
    }

    /// Point `name` at `commit_id`, creating the branch if needed.
    pub fn update_branch(&self, name: &str, commit_id: &str) -> TwigResult<()> {
        atomic_write(&self.branch_path(name), commit_id.as_bytes())?;
        debug!(branch = name, commit = commit_id, "moved branch");
        Ok(())
    }

    /// Commit id of a local branch, if it exists.
    pub fn branch(&self, name: &str) -> TwigResult<Option<String>> {
        if Self::validate_name(name).is_err() {
            return Ok(None);
        }
        read_ref(&self.branch_path(name))
    }

    /// Commit id of a local branch or a `<remote>/<branch>` tracking ref.
    pub fn resolve(&self, name: &str) -> TwigResult<Option<String>> {
        match name.split_once('/') {
            Some((remote, branch)) => self.remote_branch(remote, branch),
            None => self.branch(name),
        }
    }

    /// Commit id of a remote-tracking branch, if it exists.
    pub fn remote_branch(&self, remote: &str, branch: &str) -> TwigResult<Option<String>> {
        if Self::validate_name(remote).is_err() || Self::validate_name(branch).is_err() {
            return Ok(None);
        }
        read_ref(&self.remote_branch_path(remote, branch))
    }

    /// Point a remote-tracking branch at `commit_id`.
    pub fn update_remote_branch(
        &self,
        remote: &str,
        branch: &str,
        commit_id: &str,
    ) -> TwigResult<()> {
        atomic_write(
            &self.remote_branch_path(remote, branch),
            commit_id.as_bytes(),
        )?;
        debug!(remote, branch, commit = commit_id, "moved remote-tracking branch");
        Ok(())
    }

    /// All local branch names, sorted.
    pub fn branch_names(&self) -> TwigResult<Vec<String>> {
        Ok(list_file_names(&self.heads_dir())?
            .into_iter()
            .filter(|n| !n.ends_with(".tmp"))
            .collect())
    }

    /// Repoint HEAD at a local branch.
    pub fn set_head(&self, name: &str) -> TwigResult<()> {
        atomic_write(
            &self.dir.join("HEAD"),
            format!("{HEAD_PREFIX}{name}").as_bytes(),
        )
    }

    /// Name of the branch HEAD points to.
    pub fn current_branch(&self) -> TwigResult<String> {
        let content = fs::read_to_string(self.dir.join("HEAD"))?;
        content
            .trim()
            .strip_prefix(HEAD_PREFIX)
            .map(String::from)
            .ok_or_else(|| TwigError::Integrity(format!("malformed HEAD: {}", content.trim())))
    }

    /// Commit id of the current branch.
    pub fn current_commit_id(&self) -> TwigResult<String> {
        let branch = self.current_branch()?;
        self.branch(&branch)?
            .ok_or_else(|| TwigError::Integrity(format!("HEAD names missing branch {branch}")))
    }

    fn heads_dir(&self) -> PathBuf {
        self.dir.join("refs").join("heads")
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.heads_dir().join(name)
    }

    fn remote_branch_path(&self, remote: &str, branch: &str) -> PathBuf {
        self.dir.join("refs").join("remotes").join(remote).join(branch)
    }
}

fn read_ref(path: &Path) -> TwigResult<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}
