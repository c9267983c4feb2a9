use bincode::{Decode, Encode};
use derive_more::Display;
use snafu::Snafu;
use tracing::debug;

/// Longest accepted entry name, in bytes.
pub const MAX_NAME_LEN: usize = 254;
/// Longest stored file content, in bytes. Longer content is truncated.
pub const MAX_CONTENT_LEN: usize = 1023;
/// Maximum number of children per directory.
pub const MAX_CHILDREN: usize = 100;
/// Maximum number of live entries per tree.
pub const MAX_ENTRIES: usize = 4096;
/// Maximum number of ancestors rendered by [`Tree::path_to_string`].
pub const MAX_PATH_DEPTH: usize = 100;

/// Stable handle to an entry in a [`Tree`]'s arena.
///
/// Only ever obtained from the tree that owns the entry; using an id after
/// the entry was removed (or after [`Tree::format`]) is a logic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    pub(crate) fn from_index(index: u32) -> Self {
        EntryId(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Encode, Decode)]
pub enum EntryKind {
    #[display("directory")]
    Directory,
    #[display("file")]
    File,
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) name: String,
    pub(crate) kind: EntryKind,
    pub(crate) content: Vec<u8>,
    pub(crate) parent: Option<EntryId>,
    pub(crate) children: Vec<EntryId>,
}

/// Arena-backed namespace tree.
///
/// Every entry lives in a slot vector and is referenced by [`EntryId`] both
/// for parent back-links and child lists, so the structure carries no pointer
/// cycles. The root is always a directory with an empty name and no parent.
#[derive(Debug)]
pub struct Tree {
    slots: Vec<Option<Entry>>,
    free: Vec<u32>,
    root: EntryId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a fresh tree containing only the root directory.
    pub fn new() -> Self {
        let root = Entry {
            name: String::new(),
            kind: EntryKind::Directory,
            content: Vec::new(),
            parent: None,
            children: Vec::new(),
        };
        Tree {
            slots: vec![Some(root)],
            free: Vec::new(),
            root: EntryId(0),
        }
    }

    /// Rebuilds a tree from already-linked entries, root at slot 0.
    /// Callers are responsible for structural consistency.
    pub(crate) fn from_slots(slots: Vec<Entry>) -> Self {
        Tree {
            slots: slots.into_iter().map(Some).collect(),
            free: Vec::new(),
            root: EntryId(0),
        }
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn name(&self, id: EntryId) -> &str {
        &self.entry(id).name
    }

    pub fn kind(&self, id: EntryId) -> EntryKind {
        self.entry(id).kind
    }

    pub fn content(&self, id: EntryId) -> &[u8] {
        &self.entry(id).content
    }

    pub fn parent(&self, id: EntryId) -> Option<EntryId> {
        self.entry(id).parent
    }

    pub(crate) fn children(&self, id: EntryId) -> &[EntryId] {
        &self.entry(id).children
    }

    /// Number of live entries, root included.
    pub fn entry_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Creates a new directory under `parent`.
    pub fn create_directory(
        &mut self,
        parent: EntryId,
        name: &str,
    ) -> Result<EntryId, TreeError> {
        self.insert_child(parent, name, EntryKind::Directory, &[])
    }

    /// Creates a new file under `parent`. Content beyond
    /// [`MAX_CONTENT_LEN`] bytes is dropped.
    pub fn create_file(
        &mut self,
        parent: EntryId,
        name: &str,
        content: &[u8],
    ) -> Result<EntryId, TreeError> {
        self.insert_child(parent, name, EntryKind::File, content)
    }

    fn insert_child(
        &mut self,
        parent: EntryId,
        name: &str,
        kind: EntryKind,
        content: &[u8],
    ) -> Result<EntryId, TreeError> {
        if self.kind(parent) != EntryKind::Directory {
            return NotADirectorySnafu {
                name: self.name(parent),
            }
            .fail();
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return InvalidNameSnafu { name }.fail();
        }
        if self.find_child(parent, name).is_some() {
            return AlreadyExistsSnafu { name }.fail();
        }
        if self.children(parent).len() >= MAX_CHILDREN {
            return CapacityExceededSnafu {
                limit: MAX_CHILDREN,
            }
            .fail();
        }
        if self.entry_count() >= MAX_ENTRIES {
            return CapacityExceededSnafu { limit: MAX_ENTRIES }.fail();
        }

        let content = &content[..content.len().min(MAX_CONTENT_LEN)];
        let id = self.alloc(Entry {
            name: name.to_string(),
            kind,
            content: content.to_vec(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.entry_mut(parent).children.push(id);
        debug!("Created {} '{}' under '{}'", kind, name, self.name(parent));
        Ok(id)
    }

    /// Finds a direct child of `parent` by exact, case-sensitive name.
    pub fn find_child(&self, parent: EntryId, name: &str) -> Option<EntryId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.name(child) == name)
    }

    /// Lists `dir` for display: `.` first, `..` second unless `dir` is the
    /// root, then the real children in insertion order.
    pub fn list_children(&self, dir: EntryId) -> Vec<(String, EntryKind)> {
        let mut listing = vec![(".".to_string(), EntryKind::Directory)];
        if self.parent(dir).is_some() {
            listing.push(("..".to_string(), EntryKind::Directory));
        }
        for &child in self.children(dir) {
            listing.push((self.name(child).to_string(), self.kind(child)));
        }
        listing
    }

    /// Clears an entry in place: a file loses its content, a directory loses
    /// its entire subtree. The entry itself stays live.
    pub fn clear_subtree(&mut self, id: EntryId) {
        match self.kind(id) {
            EntryKind::File => self.entry_mut(id).content.clear(),
            EntryKind::Directory => {
                let children = std::mem::take(&mut self.entry_mut(id).children);
                for child in children {
                    self.release(child);
                }
            }
        }
    }

    /// Releases every entry and installs a fresh root as the new tree
    /// identity. Returns the new root id; previously held ids are invalid.
    pub fn format(&mut self) -> EntryId {
        debug!("Formatting tree, dropping {} entries", self.entry_count() - 1);
        self.clear_subtree(self.root);
        let root = self.slots[self.root.index()].take().expect("stale entry id");
        *self = Tree::from_slots(vec![root]);
        self.root
    }

    /// Renders the absolute path of `id` for prompt display. The ancestor
    /// walk is capped at [`MAX_PATH_DEPTH`]; deeper entries render from the
    /// truncation point.
    pub fn path_to_string(&self, id: EntryId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if segments.len() >= MAX_PATH_DEPTH {
                break;
            }
            segments.push(self.name(current).to_string());
            current = parent;
        }
        if segments.is_empty() {
            return "/".to_string();
        }
        segments.reverse();
        let mut path = String::new();
        for segment in segments {
            path.push('/');
            path.push_str(&segment);
        }
        path
    }

    fn alloc(&mut self, entry: Entry) -> EntryId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(entry);
                EntryId(slot)
            }
            None => {
                self.slots.push(Some(entry));
                EntryId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Removes `id` and its whole subtree from the arena.
    fn release(&mut self, id: EntryId) {
        let children = std::mem::take(&mut self.entry_mut(id).children);
        for child in children {
            self.release(child);
        }
        self.slots[id.index()] = None;
        self.free.push(id.index() as u32);
    }

    fn entry(&self, id: EntryId) -> &Entry {
        self.slots[id.index()].as_ref().expect("stale entry id")
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        self.slots[id.index()].as_mut().expect("stale entry id")
    }
}

#[derive(Debug, Snafu)]
pub enum TreeError {
    #[snafu(display("Invalid name '{name}'"))]
    InvalidName { name: String },
    #[snafu(display("'{name}' already exists"))]
    AlreadyExists { name: String },
    #[snafu(display("Capacity exceeded: at most {limit} entries allowed here"))]
    CapacityExceeded { limit: usize },
    #[snafu(display("'{name}' is not a directory"))]
    NotADirectory { name: String },
}
