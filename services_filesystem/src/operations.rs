//! Filesystem operations
//!
//! This module defines the operations provided by the filesystem engine,
//! the errors they report and the metadata snapshots they return.

use core_types::{EntryId, GroupId, Identity, UserId};
use fs_tree::{Entry, EntryKind, FileKind, TreeError};
use serde::{Deserialize, Serialize};
use services_storage::BlockStoreError;
use thiserror::Error;

/// Errors that can occur during filesystem operations
///
/// Every error leaves the engine exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Name already taken in the target directory
    #[error("already exists: {0}")]
    DuplicateName(String),

    /// No entry with this name
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory was required
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file was required
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// The acting identity lacks the required access
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Not enough free blocks
    #[error("out of space: {requested} blocks requested, {available} free")]
    OutOfSpace { requested: usize, available: usize },

    /// Directory still has children and removal was not recursive
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Name is empty, `.`, `..`, or contains `/` or NUL
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// The block device failed underneath the store
    #[error("storage error: {0}")]
    Storage(#[source] BlockStoreError),
}

impl From<BlockStoreError> for OperationError {
    fn from(err: BlockStoreError) -> Self {
        match err {
            BlockStoreError::OutOfSpace {
                requested,
                available,
            } => OperationError::OutOfSpace {
                requested,
                available,
            },
            other => OperationError::Storage(other),
        }
    }
}

impl From<TreeError> for OperationError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NotFound(name) => OperationError::NotFound(name),
            TreeError::DuplicateName(name) => OperationError::DuplicateName(name),
            TreeError::NotADirectory(name) => OperationError::NotADirectory(name),
            TreeError::PermissionDenied(name) => OperationError::PermissionDenied(name),
            TreeError::UnknownEntry(id) => OperationError::NotFound(format!("entry {}", id)),
        }
    }
}

/// Metadata snapshot of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatInfo {
    /// Inode-style id
    pub id: EntryId,
    pub name: String,
    pub kind: EntryKind,
    /// Content length in bytes
    pub size: usize,
    /// Block indices holding the content, in order
    pub blocks: Vec<u64>,
    /// Permission triple in three-digit form, e.g. `644`
    pub mode: u32,
    /// Permission triple as nine `rwx` characters
    pub permissions: String,
    pub uid: UserId,
    pub gid: GroupId,
    pub created_at: u64,
    pub modified_at: u64,
    pub accessed_at: u64,
}

impl From<&Entry> for StatInfo {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            kind: entry.kind(),
            size: entry.size,
            blocks: entry.blocks().to_vec(),
            mode: entry.permissions.mode(),
            permissions: entry.permissions.rwx(),
            uid: entry.owner,
            gid: entry.group,
            created_at: entry.created_at,
            modified_at: entry.modified_at,
            accessed_at: entry.accessed_at,
        }
    }
}

/// One line of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// `d` or `-` followed by three `rwx` groups
    pub permissions: String,
    pub kind: EntryKind,
    pub size: usize,
    pub uid: UserId,
    pub gid: GroupId,
    pub modified_at: u64,
    pub name: String,
}

impl From<&Entry> for EntrySummary {
    fn from(entry: &Entry) -> Self {
        Self {
            permissions: entry.permission_string(),
            kind: entry.kind(),
            size: entry.size,
            uid: entry.owner,
            gid: entry.group,
            modified_at: entry.modified_at,
            name: entry.name.clone(),
        }
    }
}

/// Block occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub block_size: usize,
    pub total_blocks: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
}

/// Filesystem operations trait
///
/// Every `path` argument is `/`-delimited and relative to the current
/// directory unless it starts with `/`. Intermediate components need
/// Execute permission; the final component names the target.
pub trait FileSystemOperations {
    /// Creates an empty directory (mode 755)
    fn create_directory(&mut self, path: &str) -> Result<EntryId, OperationError>;

    /// Moves the current directory; nothing changes unless every hop succeeds
    fn change_directory(&mut self, path: &str) -> Result<(), OperationError>;

    /// Lists the current directory in ascending name order
    fn list_directory(&self) -> Result<Vec<EntrySummary>, OperationError>;

    /// Creates an empty file (mode 644), or refreshes the modified time of an
    /// existing entry with that name
    fn create_file(&mut self, path: &str, kind: FileKind) -> Result<EntryId, OperationError>;

    /// Replaces the content of a file, creating it if absent
    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<(), OperationError>;

    /// Reads a file's content
    ///
    /// Zero bytes are dropped from the result.
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, OperationError>;

    /// Removes an entry and frees every block it references
    fn remove(&mut self, path: &str, recursive: bool) -> Result<(), OperationError>;

    /// Renames an entry within its directory
    fn rename(&mut self, path: &str, new_name: &str) -> Result<(), OperationError>;

    /// Duplicates a file or directory tree, content included
    fn copy(&mut self, src: &str, dst: &str) -> Result<EntryId, OperationError>;

    /// Sets the permission triple from a three-digit mode such as `750`
    fn change_mode(&mut self, path: &str, mode: u32) -> Result<(), OperationError>;

    /// Returns a metadata snapshot without touching any timestamp
    fn file_status(&self, path: &str) -> Result<StatInfo, OperationError>;

    /// Simulates running a program file
    fn execute(&mut self, path: &str) -> Result<(), OperationError>;

    /// Switches the acting identity; `gid` of `None` keeps the current group
    fn set_identity(&mut self, uid: u32, gid: Option<u32>);

    /// The acting identity
    fn current_identity(&self) -> Identity;

    /// Absolute path of the current directory
    fn current_path(&self) -> String;
}
