//! The in-memory namespace core.
//!
//! An arena-backed tree of named entries (directories and files), a path
//! resolver that moves a cursor through it, and a snapshot codec that
//! persists the whole tree to a flat record area and back.

mod arena;
mod resolver;
pub(crate) mod snapshot;

pub use arena::{
    EntryId, EntryKind, MAX_CHILDREN, MAX_CONTENT_LEN, MAX_ENTRIES, MAX_NAME_LEN, MAX_PATH_DEPTH,
    Tree, TreeError,
};
pub use resolver::{ResolveError, resolve};
pub use snapshot::SnapshotError;
