use alloc::{collections::BTreeMap, string::String, sync::Arc, vec, vec::Vec};

use firstfit::Allocator;
use log::{debug, warn};
use snafu::{OptionExt as _, ResultExt as _, ensure};
use spin::RwLock;

use crate::{
    error::{
        AlreadyExistsSnafu, DirectoryNotEmptySnafu, FsError, InvalidPathSnafu, IsADirectorySnafu,
        NotADirectorySnafu, NotFoundSnafu, StorageSnafu,
    },
    path,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: NodeKind,
    /// Content length in bytes, zero for directories.
    pub len: usize,
}

impl Metadata {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub metadata: Metadata,
}

/// Location of file content in the arena.
#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: usize,
    len: usize,
}

#[derive(Debug)]
enum Node {
    Directory(BTreeMap<String, Node>),
    /// Empty files own no storage.
    File(Option<Extent>),
}

impl Node {
    fn metadata(&self) -> Metadata {
        match self {
            Self::Directory(_) => Metadata {
                kind: NodeKind::Directory,
                len: 0,
            },
            Self::File(extent) => Metadata {
                kind: NodeKind::File,
                len: extent.map_or(0, |extent| extent.len),
            },
        }
    }

    fn collect_extents(&self, out: &mut Vec<Extent>) {
        match self {
            Self::Directory(children) => {
                for child in children.values() {
                    child.collect_extents(out);
                }
            }
            Self::File(extent) => out.extend(*extent),
        }
    }

    fn walk(&self, path: String, out: &mut Vec<(String, Metadata)>) {
        if let Self::Directory(children) = self {
            out.push((path.clone(), self.metadata()));
            for (name, child) in children {
                child.walk(path::join(&path, name), out);
            }
        } else {
            out.push((path, self.metadata()));
        }
    }
}

fn lookup<'n>(mut node: &'n Node, parts: &[&str], path: &str) -> Result<&'n Node, FsError> {
    for part in parts {
        let Node::Directory(children) = node else {
            return NotADirectorySnafu { path }.fail();
        };
        node = children.get(*part).context(NotFoundSnafu { path })?;
    }
    Ok(node)
}

fn lookup_mut<'n>(
    mut node: &'n mut Node,
    parts: &[&str],
    path: &str,
) -> Result<&'n mut Node, FsError> {
    for part in parts {
        let Node::Directory(children) = node else {
            return NotADirectorySnafu { path }.fail();
        };
        node = children.get_mut(*part).context(NotFoundSnafu { path })?;
    }
    Ok(node)
}

fn dir_mut<'n>(
    root: &'n mut Node,
    parts: &[&str],
    path: &str,
) -> Result<&'n mut BTreeMap<String, Node>, FsError> {
    match lookup_mut(root, parts, path)? {
        Node::Directory(children) => Ok(children),
        Node::File(_) => NotADirectorySnafu { path }.fail(),
    }
}

/// An in-memory tree of directories and files whose content lives in an
/// [`Allocator`] arena.
///
/// The tree is guarded by one reader/writer lock: lookups and reads share it,
/// every mutation takes it exclusively. The allocator lock is only ever taken
/// while the tree lock is held, never the other way round.
///
/// Dropping the file system frees all file content it still owns.
pub struct FileSystem {
    root: RwLock<Node>,
    allocator: Arc<Allocator>,
}

impl FileSystem {
    #[must_use]
    pub fn new(allocator: Arc<Allocator>) -> Self {
        Self {
            root: RwLock::new(Node::Directory(BTreeMap::new())),
            allocator,
        }
    }

    #[must_use]
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    /// Creates the file at `path`, replacing its content if it exists.
    ///
    /// The parent directory must exist. New content is stored before the old
    /// content is released, so overwriting needs room for both at once.
    pub fn create_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let parts = path::components(path)?;
        let (name, parent) = parts.split_last().context(IsADirectorySnafu { path })?;

        let mut root = self.root.write();
        let dir = dir_mut(&mut root, parent, path)?;
        let old = match dir.get(*name) {
            Some(Node::Directory(_)) => return IsADirectorySnafu { path }.fail(),
            Some(Node::File(extent)) => *extent,
            None => None,
        };

        let extent = self.store(path, content)?;
        if let Err(err) = self.release(path, old) {
            // the new extent was never published, hand it straight back
            if let Err(rollback) = self.release(path, extent) {
                warn!("failed to roll back new content of {path}: {rollback}");
            }
            return Err(err);
        }
        dir.insert(String::from(*name), Node::File(extent));

        debug!("wrote {} bytes to {path}", content.len());
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let parts = path::components(path)?;

        let root = self.root.read();
        match lookup(&root, &parts, path)? {
            Node::Directory(_) => IsADirectorySnafu { path }.fail(),
            Node::File(None) => Ok(Vec::new()),
            Node::File(Some(extent)) => {
                let mut content = vec![0; extent.len];
                self.allocator
                    .read(extent.offset, 0, &mut content)
                    .context(StorageSnafu { path })?;
                Ok(content)
            }
        }
    }

    /// Creates an empty directory at `path`. The parent must exist.
    pub fn create_dir(&self, path: &str) -> Result<(), FsError> {
        let parts = path::components(path)?;
        let (name, parent) = parts.split_last().context(AlreadyExistsSnafu { path })?;

        let mut root = self.root.write();
        let dir = dir_mut(&mut root, parent, path)?;
        ensure!(!dir.contains_key(*name), AlreadyExistsSnafu { path });
        dir.insert(String::from(*name), Node::Directory(BTreeMap::new()));

        debug!("created directory {path}");
        Ok(())
    }

    /// Removes a file, or an empty directory, and releases its storage.
    pub fn remove(&self, path: &str) -> Result<(), FsError> {
        let parts = path::components(path)?;
        let (name, parent) = parts.split_last().context(InvalidPathSnafu { path })?;

        let mut root = self.root.write();
        let dir = dir_mut(&mut root, parent, path)?;
        match dir.get(*name).context(NotFoundSnafu { path })? {
            Node::Directory(children) => {
                ensure!(children.is_empty(), DirectoryNotEmptySnafu { path });
            }
            Node::File(extent) => self.release(path, *extent)?,
        }
        dir.remove(*name);

        debug!("removed {path}");
        Ok(())
    }

    /// Lists a directory's entries sorted by name.
    pub fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let parts = path::components(path)?;

        let root = self.root.read();
        match lookup(&root, &parts, path)? {
            Node::Directory(children) => Ok(children
                .iter()
                .map(|(name, node)| DirEntry {
                    name: name.clone(),
                    metadata: node.metadata(),
                })
                .collect()),
            Node::File(_) => NotADirectorySnafu { path }.fail(),
        }
    }

    pub fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
        let parts = path::components(path)?;
        let root = self.root.read();
        Ok(lookup(&root, &parts, path)?.metadata())
    }

    /// Every path in the tree, depth first, starting with `/`.
    #[must_use]
    pub fn walk(&self) -> Vec<(String, Metadata)> {
        let mut out = Vec::new();
        self.root.read().walk(String::from("/"), &mut out);
        out
    }

    fn store(&self, path: &str, content: &[u8]) -> Result<Option<Extent>, FsError> {
        if content.is_empty() {
            return Ok(None);
        }
        let offset = self
            .allocator
            .allocate_bytes(content)
            .context(StorageSnafu { path })?;
        Ok(Some(Extent {
            offset,
            len: content.len(),
        }))
    }

    fn release(&self, path: &str, extent: Option<Extent>) -> Result<(), FsError> {
        if let Some(extent) = extent {
            self.allocator
                .free(extent.offset)
                .context(StorageSnafu { path })?;
        }
        Ok(())
    }
}

impl Drop for FileSystem {
    fn drop(&mut self) {
        let mut extents = Vec::new();
        self.root.get_mut().collect_extents(&mut extents);
        for extent in extents {
            if let Err(err) = self.allocator.free(extent.offset) {
                warn!("failed to release file storage at offset {}: {err}", extent.offset);
            }
        }
    }
}
