//! # Core Types
//!
//! This crate defines the fundamental value types shared by every layer of
//! the filesystem.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: A uid is never confused with a gid or an entry id.
//! - **No ambient state**: Ids are minted by their owner, not by a global counter.
//!
//! ## Key Types
//!
//! - [`EntryId`]: Identifier of an entry in the namespace tree
//! - [`UserId`] / [`GroupId`]: Numeric owner identities
//! - [`Identity`]: The acting (uid, gid) pair of a session

pub mod ids;

pub use ids::{EntryId, GroupId, Identity, UserId};
