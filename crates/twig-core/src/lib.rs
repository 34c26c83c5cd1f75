//! twig-core: the engine behind the twig version control system.
//!
//! Content-addressed blobs and commits live under `.twig/objects`, branches
//! are plain ref files, and a JSON stage records pending adds and removals.
//! [`Repository`] exposes every command; the other modules are the pieces it
//! is built from.

pub mod checkout;
pub mod commit;
pub mod error;
pub mod fsutil;
pub mod graph;
pub mod hash;
pub mod index;
pub mod merge;
pub mod object;
pub mod refs;
pub mod remote;
pub mod repo;
pub mod state;
pub mod worktree;

pub use error::{ErrorKind, TwigError, TwigResult};
pub use repo::Repository;
