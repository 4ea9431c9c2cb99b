//! # Filesystem Service
//!
//! This service provides an in-memory hierarchical filesystem over a fixed
//! pool of blocks, with owner/group/other permissions.
//!
//! ## Philosophy
//!
//! - One engine owns everything: blocks, entries, current directory, identity
//! - Every check goes through one permission policy
//! - A failed operation changes nothing
//!
//! ## Operations
//!
//! - `create_directory(path)` / `create_file(path, kind)`: Create entries
//! - `change_directory(path)` / `current_path()`: Navigate
//! - `list_directory()` / `file_status(path)`: Inspect metadata
//! - `write_file(path, bytes)` / `read_file(path)`: Move content
//! - `remove(path, recursive)` / `rename(path, name)` / `copy(src, dst)`: Restructure
//! - `change_mode(path, mode)` / `execute(path)`: Permissions and programs
//! - `set_identity(uid, gid)` / `current_identity()`: Switch the acting user

pub mod config;
pub mod operations;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use operations::{DiskUsage, EntrySummary, FileSystemOperations, OperationError, StatInfo};
pub use service::FilesystemEngine;
