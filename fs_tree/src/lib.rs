//! # Filesystem Tree
//!
//! This crate provides the namespace tree of the in-memory filesystem.
//!
//! ## Philosophy
//!
//! - **Entries live in an arena**: parent and child links are ids, not pointers
//! - **The root is its own parent**: `..` at the root needs no special case
//! - **Content is typed**: a directory holds children, a file holds blocks, never both
//!
//! ## Design
//!
//! - [`EntryTree`] owns every [`Entry`] and mints their ids
//! - [`PathResolver`] splits `/`-delimited paths into components
//! - [`EntryTree::resolve`] walks components, asking the caller before each hop
//! - Permissions are not evaluated here; callers pass their own traversal check

pub mod entry;
pub mod path;
pub mod tree;

pub use entry::{Entry, EntryContent, EntryKind, FileKind, ParseKindError};
pub use path::{Component, ParsedPath, PathResolver};
pub use tree::{EntryTree, TreeError};
