//! Entry records
//!
//! One [`Entry`] is one node of the namespace: a directory holding named
//! children, or a file holding an ordered list of block indices. The two
//! shapes are separate variants of [`EntryContent`], so a directory can never
//! carry blocks and a file can never carry children.

use core_types::{EntryId, GroupId, Identity, UserId};
use serde::{Deserialize, Serialize};
use services_storage::{PermissionTriple, Protected};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of a regular file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileKind {
    #[default]
    Text,
    Numeric,
    Binary,
    Program,
}

/// Error returned when a kind name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown file kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for FileKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(FileKind::Text),
            "num" | "numeric" => Ok(FileKind::Numeric),
            "bin" | "binary" => Ok(FileKind::Binary),
            "prog" | "program" => Ok(FileKind::Program),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

/// Kind of any entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Directory,
    Text,
    Numeric,
    Binary,
    Program,
}

impl From<FileKind> for EntryKind {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Text => EntryKind::Text,
            FileKind::Numeric => EntryKind::Numeric,
            FileKind::Binary => EntryKind::Binary,
            FileKind::Program => EntryKind::Program,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "DIR"),
            EntryKind::Text => write!(f, "TEXT"),
            EntryKind::Numeric => write!(f, "NUMERIC"),
            EntryKind::Binary => write!(f, "BINARY"),
            EntryKind::Program => write!(f, "PROGRAM"),
        }
    }
}

/// Kind-specific payload of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Children keyed by name; iteration is in ascending name order
    Directory(BTreeMap<String, EntryId>),
    /// Ordered block indices holding the file content
    File { kind: FileKind, blocks: Vec<u64> },
}

/// File-control-block: metadata plus content reference for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub name: String,
    /// Content length in bytes (always 0 for directories)
    pub size: usize,
    pub owner: UserId,
    pub group: GroupId,
    pub permissions: PermissionTriple,
    pub created_at: u64,
    pub modified_at: u64,
    pub accessed_at: u64,
    /// Parent directory; the root is its own parent
    pub parent: EntryId,
    content: EntryContent,
}

impl Entry {
    /// Creates an empty directory owned by `identity` with mode 755
    pub fn new_directory(
        id: EntryId,
        name: impl Into<String>,
        parent: EntryId,
        identity: Identity,
        now: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            size: 0,
            owner: identity.uid,
            group: identity.gid,
            permissions: PermissionTriple::DIRECTORY_DEFAULT,
            created_at: now,
            modified_at: now,
            accessed_at: now,
            parent,
            content: EntryContent::Directory(BTreeMap::new()),
        }
    }

    /// Creates a file owned by `identity` with mode 644
    ///
    /// `blocks` must already be allocated and hold `size` bytes of content.
    #[allow(clippy::too_many_arguments)]
    pub fn new_file(
        id: EntryId,
        name: impl Into<String>,
        kind: FileKind,
        parent: EntryId,
        identity: Identity,
        blocks: Vec<u64>,
        size: usize,
        now: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            owner: identity.uid,
            group: identity.gid,
            permissions: PermissionTriple::FILE_DEFAULT,
            created_at: now,
            modified_at: now,
            accessed_at: now,
            parent,
            content: EntryContent::File { kind, blocks },
        }
    }

    /// Returns the entry kind
    pub fn kind(&self) -> EntryKind {
        match &self.content {
            EntryContent::Directory(_) => EntryKind::Directory,
            EntryContent::File { kind, .. } => (*kind).into(),
        }
    }

    /// Returns the file kind, or `None` for directories
    pub fn file_kind(&self) -> Option<FileKind> {
        match &self.content {
            EntryContent::Directory(_) => None,
            EntryContent::File { kind, .. } => Some(*kind),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.content, EntryContent::Directory(_))
    }

    pub fn content(&self) -> &EntryContent {
        &self.content
    }

    /// Block indices of a file; empty for directories
    pub fn blocks(&self) -> &[u64] {
        match &self.content {
            EntryContent::Directory(_) => &[],
            EntryContent::File { blocks, .. } => blocks,
        }
    }

    /// Swaps in a new block list and size, returning the previous blocks
    ///
    /// Returns `None` (and changes nothing) for directories.
    pub fn replace_blocks(&mut self, new_blocks: Vec<u64>, size: usize) -> Option<Vec<u64>> {
        match &mut self.content {
            EntryContent::Directory(_) => None,
            EntryContent::File { blocks, .. } => {
                self.size = size;
                Some(std::mem::replace(blocks, new_blocks))
            }
        }
    }

    /// Children of a directory; `None` for files
    pub fn children(&self) -> Option<&BTreeMap<String, EntryId>> {
        match &self.content {
            EntryContent::Directory(children) => Some(children),
            EntryContent::File { .. } => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut BTreeMap<String, EntryId>> {
        match &mut self.content {
            EntryContent::Directory(children) => Some(children),
            EntryContent::File { .. } => None,
        }
    }

    /// Looks up a direct child by name
    pub fn child(&self, name: &str) -> Option<EntryId> {
        self.children().and_then(|children| children.get(name).copied())
    }

    /// Number of direct children (0 for files)
    pub fn child_count(&self) -> usize {
        self.children().map(|children| children.len()).unwrap_or(0)
    }

    /// Listing-style permission string, e.g. `drwxr-xr-x` or `-rw-r--r--`
    pub fn permission_string(&self) -> String {
        let prefix = if self.is_directory() { 'd' } else { '-' };
        format!("{}{}", prefix, self.permissions.rwx())
    }
}

impl Protected for Entry {
    fn owner(&self) -> UserId {
        self.owner
    }

    fn group(&self) -> GroupId {
        self.group
    }

    fn permissions(&self) -> PermissionTriple {
        self.permissions
    }
}
