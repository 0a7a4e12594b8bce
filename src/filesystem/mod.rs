//! In-memory filesystem namespace.
//!
//! This module provides a tree of directories and files addressed by absolute
//! paths. Children of every directory are kept sorted by path, files apart from
//! subdirectories, and the structure can be verified at any time with the
//! [`Checker`].

mod checker;
mod error;
mod node;
mod path;
mod sorted_vec;
mod tree;

pub use checker::{Checker, InvariantViolation};
pub use error::TreeError;
pub use node::{DirectoryRef, FileEntry, NodeId, NodeKind, NodeRef};
pub use path::{PathError, TreePath};
pub use sorted_vec::{Position, SortedVec};
pub use tree::{FileTree, NodeStat, TreeConfig};
