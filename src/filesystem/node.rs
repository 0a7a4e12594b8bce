//! Node storage for the file tree.
//!
//! Nodes live in an [`Arena`] and refer to each other through [`NodeId`]
//! handles. A directory owns the handles in its two sorted child
//! collections; the `parent` handle is a plain back-reference and never keeps
//! a node alive. Destroying a node releases its whole subtree.

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};

use derive_more::Display;
use snafu::{OptionExt, ensure};
use tracing::trace;

use crate::filesystem::error::{
    AlreadyInTreeSnafu, ConflictingPathSnafu, MemorySnafu, NoSuchPathSnafu, NotADirectorySnafu,
    TreeError,
};
use crate::filesystem::path::TreePath;
use crate::filesystem::sorted_vec::{Position, SortedVec};

/// Handle to a live node in an [`Arena`].
///
/// Indexing an arena with the handle of a destroyed node panics; the tree
/// drops every handle into a subtree before destroying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("#{_0}")]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NodeKind {
    #[display("directory")]
    Directory,
    #[display("file")]
    File,
}

/// What a new node is created as.
#[derive(Debug)]
pub enum Payload<C> {
    Directory,
    File { contents: C, length: usize },
}

impl<C> Payload<C> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Payload::Directory => NodeKind::Directory,
            Payload::File { .. } => NodeKind::File,
        }
    }
}

/// Children of a directory, files and subdirectories kept apart.
#[derive(Debug, Default)]
pub struct Directory {
    files: SortedVec<NodeId>,
    directories: SortedVec<NodeId>,
}

impl Directory {
    fn children(&self, kind: NodeKind) -> &SortedVec<NodeId> {
        match kind {
            NodeKind::File => &self.files,
            NodeKind::Directory => &self.directories,
        }
    }

    fn children_mut(&mut self, kind: NodeKind) -> &mut SortedVec<NodeId> {
        match kind {
            NodeKind::File => &mut self.files,
            NodeKind::Directory => &mut self.directories,
        }
    }

    fn find<C>(&self, arena: &Arena<C>, kind: NodeKind, path: &TreePath) -> Position {
        self.children(kind)
            .search_by(|child| arena[*child].path.compare_str(path.as_str()))
    }
}

#[derive(Debug)]
pub struct FileEntry<C> {
    contents: C,
    length: usize,
}

impl<C> FileEntry<C> {
    pub fn contents(&self) -> &C {
        &self.contents
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Swaps in new contents and hands back the old ones.
    pub(crate) fn replace(&mut self, contents: C, length: usize) -> C {
        self.length = length;
        mem::replace(&mut self.contents, contents)
    }
}

#[derive(Debug)]
enum NodeData<C> {
    Directory(Directory),
    File(FileEntry<C>),
}

impl<C> From<Payload<C>> for NodeData<C> {
    fn from(payload: Payload<C>) -> Self {
        match payload {
            Payload::Directory => NodeData::Directory(Directory::default()),
            Payload::File { contents, length } => NodeData::File(FileEntry { contents, length }),
        }
    }
}

#[derive(Debug)]
pub struct Node<C> {
    path: TreePath,
    parent: Option<NodeId>,
    data: NodeData<C>,
}

impl<C> Node<C> {
    pub fn path(&self) -> &TreePath {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Directory(_) => NodeKind::Directory,
            NodeData::File(_) => NodeKind::File,
        }
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match &self.data {
            NodeData::Directory(directory) => Some(directory),
            NodeData::File(_) => None,
        }
    }

    fn as_directory_mut(&mut self) -> Option<&mut Directory> {
        match &mut self.data {
            NodeData::Directory(directory) => Some(directory),
            NodeData::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntry<C>> {
        match &self.data {
            NodeData::File(file) => Some(file),
            NodeData::Directory(_) => None,
        }
    }

    pub(crate) fn as_file_mut(&mut self) -> Option<&mut FileEntry<C>> {
        match &mut self.data {
            NodeData::File(file) => Some(file),
            NodeData::Directory(_) => None,
        }
    }
}

/// Slot storage for every node of one tree.
#[derive(Debug)]
pub struct Arena<C> {
    slots: Vec<Option<Node<C>>>,
    vacant: Vec<NodeId>,
    live: usize,
    /// Upper bound on live nodes; reaching it is reported as an allocation failure.
    limit: Option<usize>,
}

impl<C> Arena<C> {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            live: 0,
            limit,
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<C>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Creates a node for `path` and links it into `parent`'s sorted
    /// collection for its kind.
    ///
    /// Fails with:
    /// * `NoSuchPath` if `path` is empty, if `parent` is not exactly one level
    ///   above `path`, or if there is no parent and `path` is not of depth 1
    /// * `ConflictingPath` if `parent`'s path is not a prefix of `path`
    /// * `NotADirectory` if `parent` is a file
    /// * `AlreadyInTree` if `parent` already has a child with this path
    /// * `MemoryError` if no slot or collection space could be allocated
    ///
    /// On failure nothing is left behind.
    pub fn create(
        &mut self,
        path: &TreePath,
        parent: Option<NodeId>,
        payload: Payload<C>,
    ) -> Result<NodeId, TreeError> {
        ensure!(path.depth() > 0, NoSuchPathSnafu { path: path.as_str() });

        let index = match parent {
            Some(parent) => Some(self.insertion_index(parent, path, payload.kind())?),
            None => {
                ensure!(path.depth() == 1, NoSuchPathSnafu { path: path.as_str() });
                None
            }
        };

        let id = self.allocate(Node {
            path: path.clone(),
            parent,
            data: payload.into(),
        })?;

        if let (Some(parent), Some(index)) = (parent, index) {
            if let Err(error) = self.link(parent, id, index) {
                self.release(id);
                return Err(error);
            }
        }

        trace!("Created {} node {} for {}", self[id].kind(), id, path);
        Ok(id)
    }

    /// Destroys `id` and everything below it, returning how many nodes were freed.
    pub fn destroy_subtree(&mut self, id: NodeId) -> usize {
        self.detach(id);
        let freed = self.free(id);
        trace!("Destroyed subtree {} ({} nodes)", id, freed);
        freed
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.vacant.clear();
        self.live = 0;
    }

    fn insertion_index(
        &self,
        parent: NodeId,
        path: &TreePath,
        kind: NodeKind,
    ) -> Result<usize, TreeError> {
        let parent_node = &self[parent];
        let parent_depth = parent_node.path.depth();

        ensure!(
            path.shared_prefix_depth(&parent_node.path) >= parent_depth,
            ConflictingPathSnafu { path: path.as_str() }
        );
        ensure!(
            path.depth() == parent_depth + 1,
            NoSuchPathSnafu { path: path.as_str() }
        );

        let directory = parent_node.as_directory().context(NotADirectorySnafu {
            path: parent_node.path.as_str(),
        })?;
        let files = directory.find(self, NodeKind::File, path);
        let directories = directory.find(self, NodeKind::Directory, path);
        ensure!(
            !files.is_found() && !directories.is_found(),
            AlreadyInTreeSnafu { path: path.as_str() }
        );

        Ok(match kind {
            NodeKind::File => files.index(),
            NodeKind::Directory => directories.index(),
        })
    }

    fn allocate(&mut self, node: Node<C>) -> Result<NodeId, TreeError> {
        if self.limit.is_some_and(|limit| self.live >= limit) {
            return MemorySnafu {
                path: node.path.as_str(),
            }
            .fail();
        }

        let id = match self.vacant.pop() {
            Some(id) => {
                self.slots[id.0] = Some(node);
                id
            }
            None => {
                if self.slots.try_reserve(1).is_err() {
                    return MemorySnafu {
                        path: node.path.as_str(),
                    }
                    .fail();
                }
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };
        self.live += 1;
        Ok(id)
    }

    fn link(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<(), TreeError> {
        let kind = self[child].kind();
        let Some(directory) = self[parent].as_directory_mut() else {
            return NotADirectorySnafu {
                path: self[parent].path.as_str(),
            }
            .fail();
        };
        if directory.children_mut(kind).insert_at(index, child).is_err() {
            return MemorySnafu {
                path: self[child].path.as_str(),
            }
            .fail();
        }
        Ok(())
    }

    fn release(&mut self, id: NodeId) -> Option<Node<C>> {
        let node = self.slots.get_mut(id.0)?.take()?;
        self.vacant.push(id);
        self.live -= 1;
        Some(node)
    }

    fn detach(&mut self, id: NodeId) {
        let node = &self[id];
        let Some(parent) = node.parent else {
            return;
        };
        let kind = node.kind();
        let position = match self[parent].as_directory() {
            Some(directory) => directory.find(self, kind, &node.path),
            None => return,
        };
        if let (Position::Found(index), Some(directory)) =
            (position, self[parent].as_directory_mut())
        {
            directory.children_mut(kind).remove_at(index);
        }
    }

    fn free(&mut self, id: NodeId) -> usize {
        let Some(node) = self.slots.get_mut(id.0).and_then(Option::take) else {
            return 0;
        };

        let mut freed = 1;
        if let NodeData::Directory(directory) = node.data {
            for child in directory.files.into_iter().chain(directory.directories) {
                freed += self.free(child);
            }
        }
        self.vacant.push(id);
        self.live -= 1;
        freed
    }
}

impl<C> Index<NodeId> for Arena<C> {
    type Output = Node<C>;

    fn index(&self, id: NodeId) -> &Self::Output {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {id} is not live"),
        }
    }
}

impl<C> IndexMut<NodeId> for Arena<C> {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("node {id} is not live"),
        }
    }
}

#[cfg(test)]
impl<C> Arena<C> {
    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self[id].parent = parent;
    }

    pub(crate) fn children_of(&mut self, parent: NodeId, kind: NodeKind) -> &mut SortedVec<NodeId> {
        match self[parent].as_directory_mut() {
            Some(directory) => directory.children_mut(kind),
            None => panic!("node {parent} is not a directory"),
        }
    }
}

/// Read-only view of a live node.
pub struct NodeRef<'a, C> {
    arena: &'a Arena<C>,
    id: NodeId,
}

impl<C> Clone for NodeRef<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for NodeRef<'_, C> {}

impl<C> fmt::Debug for NodeRef<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("path", &self.path().as_str())
            .field("kind", &self.kind())
            .finish()
    }
}

impl<'a, C> NodeRef<'a, C> {
    pub(crate) fn new(arena: &'a Arena<C>, id: NodeId) -> Self {
        Self { arena, id }
    }

    fn node(&self) -> &'a Node<C> {
        &self.arena[self.id]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> &'a TreePath {
        &self.node().path
    }

    pub fn parent(&self) -> Option<NodeRef<'a, C>> {
        self.node()
            .parent
            .map(|parent| NodeRef::new(self.arena, parent))
    }

    pub fn kind(&self) -> NodeKind {
        self.node().kind()
    }

    /// Children view; `None` for files.
    pub fn directory(&self) -> Option<DirectoryRef<'a, C>> {
        self.node().as_directory().map(|directory| DirectoryRef {
            node: *self,
            directory,
        })
    }

    /// Contents view; `None` for directories.
    pub fn file(&self) -> Option<&'a FileEntry<C>> {
        self.node().as_file()
    }

    /// Orders two nodes by path.
    pub fn compare(&self, other: &NodeRef<'_, C>) -> Ordering {
        self.path().cmp(other.path())
    }
}

/// Read-only view of a directory node's children.
pub struct DirectoryRef<'a, C> {
    node: NodeRef<'a, C>,
    directory: &'a Directory,
}

impl<'a, C> DirectoryRef<'a, C> {
    pub fn node(&self) -> NodeRef<'a, C> {
        self.node
    }

    pub fn num_files(&self) -> usize {
        self.directory.files.len()
    }

    pub fn num_directories(&self) -> usize {
        self.directory.directories.len()
    }

    /// Length of the collection holding children of `kind`.
    pub(crate) fn len(&self, kind: NodeKind) -> usize {
        self.directory.children(kind).len()
    }

    pub fn file(&self, index: usize) -> Result<NodeRef<'a, C>, TreeError> {
        self.child(NodeKind::File, index)
    }

    pub fn directory(&self, index: usize) -> Result<NodeRef<'a, C>, TreeError> {
        self.child(NodeKind::Directory, index)
    }

    pub fn files(&self) -> impl Iterator<Item = NodeRef<'a, C>> + use<'a, C> {
        let arena = self.node.arena;
        self.directory
            .files
            .iter()
            .map(move |id| NodeRef::new(arena, *id))
    }

    pub fn directories(&self) -> impl Iterator<Item = NodeRef<'a, C>> + use<'a, C> {
        let arena = self.node.arena;
        self.directory
            .directories
            .iter()
            .map(move |id| NodeRef::new(arena, *id))
    }

    /// Where a file child with `path` is, or would be inserted.
    pub fn has_file_child(&self, path: &TreePath) -> Position {
        self.directory.find(self.node.arena, NodeKind::File, path)
    }

    /// Where a directory child with `path` is, or would be inserted.
    pub fn has_directory_child(&self, path: &TreePath) -> Position {
        self.directory
            .find(self.node.arena, NodeKind::Directory, path)
    }

    pub(crate) fn child(&self, kind: NodeKind, index: usize) -> Result<NodeRef<'a, C>, TreeError> {
        self.directory
            .children(kind)
            .get(index)
            .map(|id| NodeRef::new(self.node.arena, *id))
            .context(NoSuchPathSnafu {
                path: format!("{}[{} {}]", self.node.path(), kind, index),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> TreePath {
        TreePath::new(text).expect("valid path")
    }

    fn file(contents: &'static str) -> Payload<&'static str> {
        Payload::File {
            contents,
            length: contents.len(),
        }
    }

    fn arena_with_root() -> (Arena<&'static str>, NodeId) {
        let mut arena = Arena::new(None);
        let root = arena
            .create(&path("/r"), None, Payload::Directory)
            .expect("root is created");
        (arena, root)
    }

    #[test]
    fn root_has_no_parent() {
        let (arena, root) = arena_with_root();

        let node = NodeRef::new(&arena, root);
        assert!(node.parent().is_none());
        assert_eq!(node.kind(), NodeKind::Directory);
        assert_eq!(node.path(), &path("/r"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn parentless_node_must_be_depth_one() {
        let mut arena: Arena<&str> = Arena::new(None);

        let result = arena.create(&path("/r/a"), None, Payload::Directory);

        assert_eq!(
            result,
            Err(TreeError::NoSuchPath {
                path: "/r/a".into()
            })
        );
        assert!(arena.is_empty());
    }

    #[test]
    fn child_outside_parent_conflicts() {
        let (mut arena, root) = arena_with_root();

        let result = arena.create(&path("/q/a"), Some(root), Payload::Directory);

        assert!(matches!(result, Err(TreeError::ConflictingPath { .. })));
    }

    #[test]
    fn child_must_be_one_level_below_parent() {
        let (mut arena, root) = arena_with_root();

        let result = arena.create(&path("/r/a/b"), Some(root), Payload::Directory);

        assert!(matches!(result, Err(TreeError::NoSuchPath { .. })));
    }

    #[test]
    fn duplicate_child_is_rejected_across_collections() {
        let (mut arena, root) = arena_with_root();
        arena
            .create(&path("/r/a"), Some(root), file("x"))
            .expect("file is created");

        let as_file = arena.create(&path("/r/a"), Some(root), file("y"));
        let as_directory = arena.create(&path("/r/a"), Some(root), Payload::Directory);

        assert!(matches!(as_file, Err(TreeError::AlreadyInTree { .. })));
        assert!(matches!(as_directory, Err(TreeError::AlreadyInTree { .. })));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn file_cannot_be_a_parent() {
        let (mut arena, root) = arena_with_root();
        let leaf = arena
            .create(&path("/r/f"), Some(root), file("x"))
            .expect("file is created");

        let result = arena.create(&path("/r/f/x"), Some(leaf), Payload::Directory);

        assert_eq!(
            result,
            Err(TreeError::NotADirectory { path: "/r/f".into() })
        );
    }

    #[test]
    fn children_are_kept_sorted_per_kind() {
        let (mut arena, root) = arena_with_root();
        for name in ["/r/c", "/r/a", "/r/b"] {
            arena
                .create(&path(name), Some(root), Payload::Directory)
                .expect("directory is created");
        }
        for name in ["/r/z.txt", "/r/m.txt"] {
            arena
                .create(&path(name), Some(root), file("x"))
                .expect("file is created");
        }

        let directory = NodeRef::new(&arena, root)
            .directory()
            .expect("root is a directory");
        let directories: Vec<_> = directory.directories().map(|n| n.path().as_str()).collect();
        let files: Vec<_> = directory.files().map(|n| n.path().as_str()).collect();

        assert_eq!(directories, vec!["/r/a", "/r/b", "/r/c"]);
        assert_eq!(files, vec!["/r/m.txt", "/r/z.txt"]);
        assert_eq!(directory.num_files() + directory.num_directories(), 5);
    }

    #[test]
    fn child_lookup_reports_insertion_index() {
        let (mut arena, root) = arena_with_root();
        for name in ["/r/a", "/r/c"] {
            arena
                .create(&path(name), Some(root), Payload::Directory)
                .expect("directory is created");
        }

        let directory = NodeRef::new(&arena, root)
            .directory()
            .expect("root is a directory");

        assert_eq!(
            directory.has_directory_child(&path("/r/c")),
            Position::Found(1)
        );
        assert_eq!(
            directory.has_directory_child(&path("/r/b")),
            Position::Vacant(1)
        );
        assert_eq!(directory.has_file_child(&path("/r/a")), Position::Vacant(0));
    }

    #[test]
    fn indexed_child_out_of_range_is_no_such_path() {
        let (arena, root) = arena_with_root();

        let directory = NodeRef::new(&arena, root)
            .directory()
            .expect("root is a directory");

        assert!(matches!(
            directory.file(0),
            Err(TreeError::NoSuchPath { .. })
        ));
        assert!(matches!(
            directory.directory(3),
            Err(TreeError::NoSuchPath { .. })
        ));
    }

    #[test]
    fn file_nodes_expose_contents_but_no_children() {
        let (mut arena, root) = arena_with_root();
        let leaf = arena
            .create(&path("/r/f"), Some(root), file("hello"))
            .expect("file is created");

        let node = NodeRef::new(&arena, leaf);

        assert!(node.directory().is_none());
        let entry = node.file().expect("node is a file");
        assert_eq!(*entry.contents(), "hello");
        assert_eq!(entry.length(), 5);
        assert_eq!(node.parent().map(|p| p.id()), Some(root));
    }

    #[test]
    fn destroy_subtree_counts_and_detaches() {
        let (mut arena, root) = arena_with_root();
        let a = arena
            .create(&path("/r/a"), Some(root), Payload::Directory)
            .expect("directory is created");
        arena
            .create(&path("/r/a/x"), Some(a), file("x"))
            .expect("file is created");
        let b = arena
            .create(&path("/r/a/b"), Some(a), Payload::Directory)
            .expect("directory is created");
        arena
            .create(&path("/r/a/b/y"), Some(b), file("y"))
            .expect("file is created");
        arena
            .create(&path("/r/keep"), Some(root), Payload::Directory)
            .expect("directory is created");

        let freed = arena.destroy_subtree(a);

        assert_eq!(freed, 4);
        assert_eq!(arena.len(), 2);
        let directory = NodeRef::new(&arena, root)
            .directory()
            .expect("root is a directory");
        let remaining: Vec<_> = directory.directories().map(|n| n.path().as_str()).collect();
        assert_eq!(remaining, vec!["/r/keep"]);
        assert!(arena.get(a).is_none());
    }

    #[test]
    fn destroying_the_root_frees_everything() {
        let (mut arena, root) = arena_with_root();
        arena
            .create(&path("/r/a"), Some(root), Payload::Directory)
            .expect("directory is created");

        assert_eq!(arena.destroy_subtree(root), 2);
        assert!(arena.is_empty());
    }

    #[test]
    fn freed_slots_are_reused() {
        let (mut arena, root) = arena_with_root();
        let a = arena
            .create(&path("/r/a"), Some(root), Payload::Directory)
            .expect("directory is created");
        arena.destroy_subtree(a);

        let b = arena
            .create(&path("/r/b"), Some(root), Payload::Directory)
            .expect("directory is created");

        assert_eq!(a, b);
        assert_eq!(NodeRef::new(&arena, b).path(), &path("/r/b"));
    }

    #[test]
    fn node_limit_reports_memory_error_without_side_effects() {
        let mut arena = Arena::new(Some(2));
        let root = arena
            .create(&path("/r"), None, Payload::Directory)
            .expect("root is created");
        arena
            .create(&path("/r/a"), Some(root), Payload::Directory)
            .expect("directory is created");

        let result = arena.create(&path("/r/b"), Some(root), file("x"));

        assert_eq!(result, Err(TreeError::MemoryError { path: "/r/b".into() }));
        assert_eq!(arena.len(), 2);
        let directory = NodeRef::new(&arena, root)
            .directory()
            .expect("root is a directory");
        assert_eq!(directory.num_files() + directory.num_directories(), 1);
    }

    #[test]
    fn compare_orders_by_path() {
        let (mut arena, root) = arena_with_root();
        let a = arena
            .create(&path("/r/a"), Some(root), Payload::Directory)
            .expect("directory is created");
        let b = arena
            .create(&path("/r/b"), Some(root), Payload::Directory)
            .expect("directory is created");

        let a = NodeRef::new(&arena, a);
        let b = NodeRef::new(&arena, b);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&a), Ordering::Greater);
        assert_eq!(a.compare(&a), Ordering::Equal);
    }
}
