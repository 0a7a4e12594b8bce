use snafu::Snafu;

use crate::filesystem::path::PathError;

/// Every failure a node or tree operation can report.
///
/// Each variant carries the rendered path the operation was working on, so
/// callers can log a failure without keeping the input around.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum TreeError {
    #[snafu(display("Tree is {}", if *initialized { "already initialized" } else { "not initialized" }))]
    InitializationError { initialized: bool },
    #[snafu(display("Malformed path: {}", source))]
    BadPath { source: PathError },
    #[snafu(display("No such path: {}", path))]
    NoSuchPath { path: String },
    #[snafu(display("Path {} conflicts with the existing root", path))]
    ConflictingPath { path: String },
    #[snafu(display("Path {} is already in the tree", path))]
    AlreadyInTree { path: String },
    #[snafu(display("Path {} is not a directory", path))]
    NotADirectory { path: String },
    #[snafu(display("Path {} is not a file", path))]
    NotAFile { path: String },
    #[snafu(display("Failed to allocate a node for {}", path))]
    MemoryError { path: String },
}
