//! Immutable absolute paths used to address nodes in a [`FileTree`](super::FileTree).
//!
//! A path is a non-empty sequence of non-empty components, rendered as
//! `/first/second/...`. Ordering and equality follow the rendered string.

use std::cmp::Ordering;
use std::str::FromStr;

use derive_more::Display;
use snafu::{Snafu, ensure};

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{rendered}")]
pub struct TreePath {
    rendered: String,
    /// Byte offset of the end of each component within `rendered`.
    ends: Vec<usize>,
}

impl TreePath {
    pub fn new(text: &str) -> Result<Self, PathError> {
        ensure!(!text.is_empty(), EmptySnafu);
        ensure!(!text.contains('\0'), NulCharacterSnafu { text });
        let Some(rest) = text.strip_prefix(SEPARATOR) else {
            return NotAbsoluteSnafu { text }.fail();
        };

        let mut ends = Vec::new();
        let mut offset = 0;
        for component in rest.split(SEPARATOR) {
            ensure!(!component.is_empty(), EmptyComponentSnafu { text });
            offset += SEPARATOR.len_utf8() + component.len();
            ends.push(offset);
        }

        Ok(Self {
            rendered: text.to_string(),
            ends,
        })
    }

    /// Number of components.
    pub fn depth(&self) -> usize {
        self.ends.len()
    }

    /// The path made of the first `depth` components.
    pub fn prefix(&self, depth: usize) -> Result<Self, PathError> {
        ensure!(
            depth > 0 && depth <= self.depth(),
            NoSuchDepthSnafu {
                path: self.rendered.as_str(),
                depth,
            }
        );
        let end = self.ends[depth - 1];
        Ok(Self {
            rendered: self.rendered[..end].to_string(),
            ends: self.ends[..depth].to_vec(),
        })
    }

    /// Number of leading components shared with `other`.
    pub fn shared_prefix_depth(&self, other: &TreePath) -> usize {
        self.components()
            .zip(other.components())
            .take_while(|(left, right)| left == right)
            .count()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        let starts = std::iter::once(0).chain(self.ends.iter().copied());
        starts
            .zip(self.ends.iter().copied())
            .map(|(start, end)| &self.rendered[start + SEPARATOR.len_utf8()..end])
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn compare_str(&self, other: &str) -> Ordering {
        self.rendered.as_str().cmp(other)
    }
}

impl Ord for TreePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rendered.cmp(&other.rendered)
    }
}

impl PartialOrd for TreePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for TreePath {
    type Err = PathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::new(text)
    }
}

#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum PathError {
    #[snafu(display("Path is empty"))]
    Empty,
    #[snafu(display("Path '{}' must start with '{}'", text, SEPARATOR))]
    NotAbsolute { text: String },
    #[snafu(display("Path '{}' contains an empty component", text))]
    EmptyComponent { text: String },
    #[snafu(display("Path '{}' contains a NUL character", text.escape_debug()))]
    NulCharacter { text: String },
    #[snafu(display("Path '{}' has no prefix of depth {}", path, depth))]
    NoSuchDepth { path: String, depth: usize },
}
