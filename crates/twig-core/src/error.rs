//! Error types for twig operations.
//!
//! Precondition messages are part of the user-visible contract and are
//! printed verbatim by the CLI.

use std::io;

use thiserror::Error;

/// Broad classification of a [`TwigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command was refused before any durable state changed.
    Precondition,
    /// A stored object is missing or corrupt.
    Integrity,
    /// The file system or serializer failed underneath us.
    Io,
}

/// All possible twig errors.
#[derive(Debug, Error)]
pub enum TwigError {
    #[error("Not in an initialized Twig directory.")]
    NotARepo,

    #[error("A Twig version-control system already exists in the current directory.")]
    AlreadyExists,

    #[error("File does not exist.")]
    FileDoesNotExist(String),

    #[error("Please enter a commit message.")]
    EmptyCommitMessage,

    #[error("No changes added to the commit.")]
    NoChangesToCommit,

    #[error("No reason to remove the file.")]
    NothingToRemove(String),

    #[error("No commit with that id exists.")]
    CommitNotFound(String),

    #[error("Found no commit with that message.")]
    NoCommitWithMessage,

    #[error("File does not exist in that commit.")]
    FileNotInCommit(String),

    /// Checkout of a branch that does not exist.
    #[error("No such branch exists.")]
    UnknownBranch(String),

    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch,

    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    UntrackedFileConflict(String),

    #[error("A branch with that name already exists.")]
    BranchExists(String),

    /// Deletion of a branch that does not exist.
    #[error("A branch with that name does not exist.")]
    BranchNotFound(String),

    #[error("Cannot remove the current branch.")]
    CannotDeleteCurrent,

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("You have uncommitted changes.")]
    UncommittedChanges,

    /// Merge with a branch that does not exist.
    #[error("A branch with that name does not exist.")]
    NoSuchBranch(String),

    #[error("Cannot merge a branch with itself.")]
    SelfMerge,

    #[error("Given branch is an ancestor of the current branch.")]
    AlreadyAncestor,

    #[error("A remote with that name already exists.")]
    RemoteExists(String),

    #[error("A remote with that name does not exist.")]
    RemoteNotFound(String),

    #[error("Remote directory not found.")]
    RemoteDirMissing(String),

    #[error("Please pull down remote changes before pushing.")]
    PushRejected,

    #[error("That remote does not have that branch.")]
    RemoteBranchMissing(String),

    #[error("path escapes the repository root: {0}")]
    PathTraversal(String),

    /// A stored object is unreadable, missing, or inconsistent with its address.
    #[error("repository corrupt: {0}")]
    Integrity(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TwigError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TwigError::Integrity(_) => ErrorKind::Integrity,
            TwigError::Io(_) | TwigError::Json(_) => ErrorKind::Io,
            _ => ErrorKind::Precondition,
        }
    }
}

/// Convenience alias for Results in twig.
pub type TwigResult<T> = Result<T, TwigError>;
