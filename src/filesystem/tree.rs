use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, error};

use crate::filesystem::checker::{Checker, InvariantViolation};
use crate::filesystem::error::{
    AlreadyInTreeSnafu, BadPathSnafu, ConflictingPathSnafu, InitializationSnafu, NoSuchPathSnafu,
    NotADirectorySnafu, NotAFileSnafu, TreeError,
};
use crate::filesystem::node::{Arena, FileEntry, NodeId, NodeKind, NodeRef, Payload};
use crate::filesystem::path::TreePath;
use crate::filesystem::sorted_vec::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum number of live nodes. Creating a node beyond it fails with
    /// `MemoryError`, exactly like an allocation failure.
    pub node_limit: Option<usize>,
    /// Run the invariant checker after every mutation.
    pub self_check: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            node_limit: None,
            self_check: cfg!(debug_assertions),
        }
    }
}

/// What [`FileTree::stat`] reports about a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStat {
    Directory,
    File { size: usize },
}

impl NodeStat {
    pub fn is_file(&self) -> bool {
        matches!(self, NodeStat::File { .. })
    }

    pub fn size(&self) -> Option<usize> {
        match self {
            NodeStat::File { size } => Some(*size),
            NodeStat::Directory => None,
        }
    }
}

/// A hierarchy of directories and files addressed by absolute paths.
///
/// A fresh tree is uninitialized; every operation except [`init`](Self::init)
/// fails with `InitializationError` until it is initialized. Files carry an
/// opaque `C` handle together with a length and can never be the root.
#[derive(Debug)]
pub struct FileTree<C> {
    initialized: bool,
    root: Option<NodeId>,
    count: usize,
    arena: Arena<C>,
    config: TreeConfig,
}

impl<C> Default for FileTree<C> {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl<C> FileTree<C> {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            initialized: false,
            root: None,
            count: 0,
            arena: Arena::new(config.node_limit),
            config,
        }
    }

    pub fn init(&mut self) -> Result<(), TreeError> {
        ensure!(!self.initialized, InitializationSnafu { initialized: true });

        self.initialized = true;
        self.root = None;
        self.count = 0;
        debug!("Initialized file tree");
        Ok(())
    }

    /// Frees every node and returns the tree to the uninitialized state.
    pub fn destroy(&mut self) -> Result<(), TreeError> {
        self.ensure_initialized()?;

        if let Some(root) = self.root.take() {
            let freed = self.arena.destroy_subtree(root);
            debug!("Destroyed file tree ({} nodes)", freed);
        }
        self.arena.clear();
        self.count = 0;
        self.initialized = false;
        Ok(())
    }

    /// Inserts `path` as a directory, creating any missing ancestors.
    pub fn insert_directory(&mut self, path: &str) -> Result<(), TreeError> {
        self.insert(path, Payload::Directory)
    }

    /// Inserts `path` as a file, creating any missing ancestor directories.
    pub fn insert_file(&mut self, path: &str, contents: C, length: usize) -> Result<(), TreeError> {
        self.insert(path, Payload::File { contents, length })
    }

    pub fn remove_file(&mut self, path: &str) -> Result<(), TreeError> {
        self.remove(path, NodeKind::File)
    }

    /// Removes the directory at `path` together with everything below it.
    pub fn remove_directory(&mut self, path: &str) -> Result<(), TreeError> {
        self.remove(path, NodeKind::Directory)
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.find(path)
            .is_ok_and(|id| self.arena[id].kind() == NodeKind::File)
    }

    pub fn contains_directory(&self, path: &str) -> bool {
        self.find(path)
            .is_ok_and(|id| self.arena[id].kind() == NodeKind::Directory)
    }

    pub fn stat(&self, path: &str) -> Result<NodeStat, TreeError> {
        let id = self.find(path)?;
        Ok(match self.arena[id].as_file() {
            Some(file) => NodeStat::File {
                size: file.length(),
            },
            None => NodeStat::Directory,
        })
    }

    pub fn get_file_contents(&self, path: &str) -> Result<&C, TreeError> {
        let id = self.find(path)?;
        let node = &self.arena[id];
        node.as_file()
            .map(FileEntry::contents)
            .context(NotAFileSnafu {
                path: node.path().as_str(),
            })
    }

    /// Stores new contents for the file at `path` and returns the previous ones.
    pub fn replace_file_contents(
        &mut self,
        path: &str,
        contents: C,
        length: usize,
    ) -> Result<C, TreeError> {
        let id = self.find(path)?;
        let Some(file) = self.arena[id].as_file_mut() else {
            return NotAFileSnafu {
                path: self.arena[id].path().as_str(),
            }
            .fail();
        };
        let previous = file.replace(contents, length);
        debug!("Replaced contents of {} ({} bytes)", path, length);
        Ok(previous)
    }

    /// One path per line, in preorder: a directory, its files, then each
    /// subdirectory in turn.
    pub fn render(&self) -> Result<String, TreeError> {
        self.ensure_initialized()?;

        Ok(self
            .nodes()
            .iter()
            .fold(String::new(), |mut rendered, node| {
                rendered.push_str(node.path().as_str());
                rendered.push('\n');
                rendered
            }))
    }

    /// Every node in the order [`render`](Self::render) lists them.
    pub fn nodes(&self) -> Vec<NodeRef<'_, C>> {
        let mut nodes = Vec::with_capacity(self.count);
        if let Some(root) = self.root() {
            Self::collect_preorder(root, &mut nodes);
        }
        nodes
    }

    pub fn root(&self) -> Option<NodeRef<'_, C>> {
        self.root.map(|root| NodeRef::new(&self.arena, root))
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Runs the invariant checker over this tree's state.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        Checker::check(self.initialized, self.root(), self.count)
    }

    fn insert(&mut self, path: &str, leaf: Payload<C>) -> Result<(), TreeError> {
        self.ensure_initialized()?;
        let path = TreePath::new(path).context(BadPathSnafu)?;
        let furthest = self.traverse(&path)?;

        let first_level = match furthest {
            None => 1,
            Some(id) => {
                let node = &self.arena[id];
                ensure!(
                    node.path() != &path,
                    AlreadyInTreeSnafu {
                        path: path.as_str()
                    }
                );
                ensure!(
                    node.kind() == NodeKind::Directory,
                    NotADirectorySnafu {
                        path: node.path().as_str()
                    }
                );
                node.path().depth() + 1
            }
        };
        ensure!(
            leaf.kind() == NodeKind::Directory || path.depth() > 1,
            ConflictingPathSnafu {
                path: path.as_str()
            }
        );

        let first_new = self.build(&path, furthest, first_level, leaf)?;
        let created = path.depth() + 1 - first_level;
        self.root.get_or_insert(first_new);
        self.count += created;
        debug!("Inserted {} ({} new nodes)", path, created);

        self.self_check();
        Ok(())
    }

    /// Creates levels `first_level..=depth` of `path` below `parent`.
    /// Returns the topmost new node, or tears down everything created here.
    fn build(
        &mut self,
        path: &TreePath,
        parent: Option<NodeId>,
        first_level: usize,
        leaf: Payload<C>,
    ) -> Result<NodeId, TreeError> {
        let depth = path.depth();
        let mut first_new = None;
        let mut parent = parent;

        for level in first_level..depth {
            let id = self.create_level(path, level, parent, Payload::Directory, &mut first_new)?;
            parent = Some(id);
        }
        let leaf = self.create_level(path, depth, parent, leaf, &mut first_new)?;

        Ok(first_new.unwrap_or(leaf))
    }

    fn create_level(
        &mut self,
        path: &TreePath,
        level: usize,
        parent: Option<NodeId>,
        payload: Payload<C>,
        first_new: &mut Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        let created = path
            .prefix(level)
            .context(BadPathSnafu)
            .and_then(|prefix| self.arena.create(&prefix, parent, payload));

        match created {
            Ok(id) => {
                first_new.get_or_insert(id);
                Ok(id)
            }
            Err(error) => {
                if let Some(first) = first_new.take() {
                    let freed = self.arena.destroy_subtree(first);
                    debug!("Rolled back {} nodes created for {}: {}", freed, path, error);
                }
                Err(error)
            }
        }
    }

    fn remove(&mut self, path: &str, kind: NodeKind) -> Result<(), TreeError> {
        let id = self.find(path)?;
        let node = &self.arena[id];
        match (kind, node.kind()) {
            (NodeKind::File, NodeKind::Directory) => {
                return NotAFileSnafu {
                    path: node.path().as_str(),
                }
                .fail();
            }
            (NodeKind::Directory, NodeKind::File) => {
                return NotADirectorySnafu {
                    path: node.path().as_str(),
                }
                .fail();
            }
            _ => {}
        }

        let freed = self.arena.destroy_subtree(id);
        self.count = self.count.saturating_sub(freed);
        if self.count == 0 || self.root == Some(id) {
            self.root = None;
        }
        debug!("Removed {} {} ({} nodes)", kind, path, freed);

        self.self_check();
        Ok(())
    }

    /// Looks up the node at exactly `path`.
    fn find(&self, path: &str) -> Result<NodeId, TreeError> {
        self.ensure_initialized()?;
        let path = TreePath::new(path).context(BadPathSnafu)?;

        self.traverse(&path)?
            .filter(|id| self.arena[*id].path() == &path)
            .context(NoSuchPathSnafu {
                path: path.as_str(),
            })
    }

    /// Walks from the root towards `path` as far as existing nodes allow and
    /// returns the furthest node reached, or `None` for an empty tree.
    /// A file ends the walk since nothing can sit below it.
    fn traverse(&self, path: &TreePath) -> Result<Option<NodeId>, TreeError> {
        let Some(root) = self.root() else {
            return Ok(None);
        };
        let top = path.prefix(1).context(BadPathSnafu)?;
        ensure!(
            root.path() == &top,
            ConflictingPathSnafu {
                path: path.as_str()
            }
        );

        let mut current = root;
        for level in 2..=path.depth() {
            let Some(directory) = current.directory() else {
                break;
            };
            let prefix = path.prefix(level).context(BadPathSnafu)?;
            if let Position::Found(index) = directory.has_file_child(&prefix) {
                current = directory.file(index)?;
                break;
            }
            match directory.has_directory_child(&prefix) {
                Position::Found(index) => current = directory.directory(index)?,
                Position::Vacant(_) => break,
            }
        }
        Ok(Some(current.id()))
    }

    fn collect_preorder<'a>(node: NodeRef<'a, C>, nodes: &mut Vec<NodeRef<'a, C>>) {
        nodes.push(node);
        if let Some(directory) = node.directory() {
            nodes.extend(directory.files());
            for child in directory.directories() {
                Self::collect_preorder(child, nodes);
            }
        }
    }

    fn ensure_initialized(&self) -> Result<(), TreeError> {
        ensure!(self.initialized, InitializationSnafu { initialized: false });
        Ok(())
    }

    fn self_check(&self) {
        if !self.config.self_check {
            return;
        }
        let checked = self.check();
        if let Err(violation) = &checked {
            error!("File tree invariant violated: {violation}");
        }
        if self.arena.len() != self.count {
            error!(
                "File tree holds {} live nodes but reports {}",
                self.arena.len(),
                self.count
            );
        }
        debug_assert!(checked.is_ok(), "file tree invariant violated: {checked:?}");
    }

    #[cfg(test)]
    pub(crate) fn arena_mut(&mut self) -> &mut Arena<C> {
        &mut self.arena
    }
}
