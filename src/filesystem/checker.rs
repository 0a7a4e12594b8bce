//! Read-only structural verification of a [`FileTree`](super::FileTree).
//!
//! The checker walks the tree in preorder and stops at the first broken
//! invariant. It never repairs anything.

use snafu::{OptionExt, Snafu, ensure};
use tracing::error;

use crate::filesystem::node::{DirectoryRef, NodeKind, NodeRef};

pub struct Checker;

impl Checker {
    /// Checks a tree given its state variables, logging the first violation found.
    pub fn is_valid<C>(initialized: bool, root: Option<NodeRef<'_, C>>, count: usize) -> bool {
        match Self::check(initialized, root, count) {
            Ok(()) => true,
            Err(violation) => {
                error!("File tree invariant violated: {violation}");
                false
            }
        }
    }

    pub fn check<C>(
        initialized: bool,
        root: Option<NodeRef<'_, C>>,
        count: usize,
    ) -> Result<(), InvariantViolation> {
        ensure!(initialized || count == 0, UninitializedWithNodesSnafu { count });

        let Some(root) = root else {
            ensure!(count == 0, EmptyRootWithNodesSnafu { count });
            return Ok(());
        };
        ensure!(
            root.parent().is_none(),
            RootHasParentSnafu {
                root: root.path().as_str(),
            }
        );

        let mut visited = 0;
        Self::check_subtree(root, &mut visited)?;
        ensure!(
            visited == count,
            CountMismatchSnafu {
                reported: count,
                actual: visited,
            }
        );
        Ok(())
    }

    /// Checks one node against its parent.
    pub fn check_node<C>(node: NodeRef<'_, C>) -> Result<(), InvariantViolation> {
        let Some(parent) = node.parent() else {
            return Ok(());
        };
        let depth = node.path().depth();
        let is_direct_parent = parent.path().depth() + 1 == depth
            && node.path().shared_prefix_depth(parent.path()) + 1 == depth;
        ensure!(
            is_direct_parent,
            NotParentChildSnafu {
                parent: parent.path().as_str(),
                child: node.path().as_str(),
            }
        );
        Ok(())
    }

    fn check_subtree<C>(node: NodeRef<'_, C>, visited: &mut usize) -> Result<(), InvariantViolation> {
        Self::check_node(node)?;
        *visited += 1;
        if *visited > 1 {
            ensure!(
                node.parent().is_some(),
                OrphanNodeSnafu {
                    path: node.path().as_str(),
                }
            );
        }

        let Some(directory) = node.directory() else {
            return Ok(());
        };
        for kind in [NodeKind::File, NodeKind::Directory] {
            let mut previous: Option<NodeRef<'_, C>> = None;
            for index in 0..directory.len(kind) {
                let child = Self::child_at(&directory, kind, index)?;
                Self::check_membership(node, child, kind)?;
                if let Some(previous) = previous {
                    Self::check_order(node, previous, child)?;
                }
                previous = Some(child);
                Self::check_subtree(child, visited)?;
            }
        }
        Ok(())
    }

    fn child_at<'a, C>(
        directory: &DirectoryRef<'a, C>,
        kind: NodeKind,
        index: usize,
    ) -> Result<NodeRef<'a, C>, InvariantViolation> {
        directory.child(kind, index).ok().context(ChildCountMismatchSnafu {
            parent: directory.node().path().as_str(),
            kind,
            index,
        })
    }

    fn check_membership<C>(
        node: NodeRef<'_, C>,
        child: NodeRef<'_, C>,
        kind: NodeKind,
    ) -> Result<(), InvariantViolation> {
        ensure!(
            child.kind() == kind,
            MisfiledChildSnafu {
                parent: node.path().as_str(),
                child: child.path().as_str(),
                kind: child.kind(),
            }
        );
        ensure!(
            child
                .parent()
                .is_none_or(|parent| parent.id() == node.id()),
            ParentMismatchSnafu {
                parent: node.path().as_str(),
                child: child.path().as_str(),
            }
        );
        Ok(())
    }

    fn check_order<C>(
        node: NodeRef<'_, C>,
        previous: NodeRef<'_, C>,
        next: NodeRef<'_, C>,
    ) -> Result<(), InvariantViolation> {
        match previous.compare(&next) {
            std::cmp::Ordering::Less => Ok(()),
            std::cmp::Ordering::Equal => DuplicateChildSnafu {
                parent: node.path().as_str(),
                child: next.path().as_str(),
            }
            .fail(),
            std::cmp::Ordering::Greater => UnsortedChildrenSnafu {
                parent: node.path().as_str(),
                previous: previous.path().as_str(),
                next: next.path().as_str(),
            }
            .fail(),
        }
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum InvariantViolation {
    #[snafu(display("The tree is uninitialized but claims {} nodes", count))]
    UninitializedWithNodes { count: usize },
    #[snafu(display("The root is empty but the node count is {}", count))]
    EmptyRootWithNodes { count: usize },
    #[snafu(display("Root {} has a parent", root))]
    RootHasParent { root: String },
    #[snafu(display("Parent-child nodes don't have parent-child paths: ({}) ({})", parent, child))]
    NotParentChild { parent: String, child: String },
    #[snafu(display("Non-root node {} has no parent", path))]
    OrphanNode { path: String },
    #[snafu(display("Child {} of {} points at a different parent", child, parent))]
    ParentMismatch { parent: String, child: String },
    #[snafu(display("Child {} of {} is a {} in the wrong collection", child, parent, kind))]
    MisfiledChild {
        parent: String,
        child: String,
        kind: NodeKind,
    },
    #[snafu(display("Children of {} are not sorted: {} before {}", parent, previous, next))]
    UnsortedChildren {
        parent: String,
        previous: String,
        next: String,
    },
    #[snafu(display("{} has duplicate child {}", parent, child))]
    DuplicateChild { parent: String, child: String },
    #[snafu(display(
        "{} claims more {} children than indexed access returns (missing index {})",
        parent,
        kind,
        index
    ))]
    ChildCountMismatch {
        parent: String,
        kind: NodeKind,
        index: usize,
    },
    #[snafu(display("The tree reports {} nodes but {} are reachable", reported, actual))]
    CountMismatch { reported: usize, actual: usize },
}
