//! # Storage Service
//!
//! This crate defines the storage layer underneath the filesystem tree.
//!
//! ## Design
//!
//! - **BlockStore**: fixed pool of blocks with an occupancy bitmap
//! - **All-or-nothing allocation**: a failed request leaves the bitmap untouched
//! - **Zero on free**: released blocks never leak old bytes into new files
//! - **Permissions**: owner/group/other triples evaluated by one policy
//! - **FailingBlockDevice**: fault injection for atomicity tests

pub mod block_store;
pub mod failing_device;
pub mod permissions;

pub use block_store::{BlockStore, BlockStoreError};
pub use failing_device::{FailingBlockDevice, FailurePolicy};
pub use permissions::{
    effective_permission, permission_class, Access, PermissionClass, PermissionPolicy,
    PermissionTriple, Protected,
};
