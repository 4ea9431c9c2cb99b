//! # Owner/Group/Other Permissions
//!
//! This module implements the permission model applied to every entry.
//!
//! ## Design Principles
//!
//! 1. **One class per check**: the requester is matched as owner, else as
//!    group member, else as other. Exactly one triple digit is consulted.
//! 2. **Bitmask digits**: each digit is a mask of Read(4)/Write(2)/Execute(1).
//!    Bits above the low three are carried but never grant anything.
//! 3. **Explicit superuser policy**: whether uid 0 bypasses checks is a flag
//!    on [`PermissionPolicy`], consulted by every check.

use bitflags::bitflags;
use core_types::{GroupId, Identity, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Requested access mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u8 {
        /// Read content / list a directory
        const READ = 4;
        /// Modify content / add and remove directory entries
        const WRITE = 2;
        /// Run a file / traverse a directory
        const EXECUTE = 1;
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Access::READ) {
            names.push("read");
        }
        if self.contains(Access::WRITE) {
            names.push("write");
        }
        if self.contains(Access::EXECUTE) {
            names.push("execute");
        }
        write!(f, "{}", names.join("+"))
    }
}

/// Which digit of a permission triple applies to a requester
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionClass {
    Owner,
    Group,
    Other,
}

/// Owner/group/other permission digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionTriple {
    pub owner: u8,
    pub group: u8,
    pub other: u8,
}

impl PermissionTriple {
    /// `rwxr-xr-x`, given to new directories
    pub const DIRECTORY_DEFAULT: PermissionTriple = PermissionTriple::new(7, 5, 5);

    /// `rw-r--r--`, given to new files
    pub const FILE_DEFAULT: PermissionTriple = PermissionTriple::new(6, 4, 4);

    /// Creates a triple from its three digits
    pub const fn new(owner: u8, group: u8, other: u8) -> Self {
        Self {
            owner,
            group,
            other,
        }
    }

    /// Decodes a mode such as `755` by decimal digit extraction
    ///
    /// Hundreds, tens and units become owner, group and other. Digits are
    /// not range checked; anything above the hundreds digit is dropped.
    pub fn from_mode(mode: u32) -> Self {
        Self {
            owner: ((mode / 100) % 10) as u8,
            group: ((mode / 10) % 10) as u8,
            other: (mode % 10) as u8,
        }
    }

    /// Encodes the triple back into its three-digit form
    pub fn mode(&self) -> u32 {
        self.owner as u32 * 100 + self.group as u32 * 10 + self.other as u32
    }

    /// Returns the digit for a class
    pub fn digit(&self, class: PermissionClass) -> u8 {
        match class {
            PermissionClass::Owner => self.owner,
            PermissionClass::Group => self.group,
            PermissionClass::Other => self.other,
        }
    }

    /// Renders the triple as nine `rwx` characters, e.g. `rw-r--r--`
    pub fn rwx(&self) -> String {
        [self.owner, self.group, self.other]
            .iter()
            .map(|digit| digit_rwx(*digit))
            .collect()
    }
}

impl Default for PermissionTriple {
    fn default() -> Self {
        Self::FILE_DEFAULT
    }
}

impl fmt::Display for PermissionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, self.group, self.other)
    }
}

fn digit_rwx(digit: u8) -> String {
    let access = Access::from_bits_truncate(digit);
    let mut s = String::with_capacity(3);
    s.push(if access.contains(Access::READ) { 'r' } else { '-' });
    s.push(if access.contains(Access::WRITE) { 'w' } else { '-' });
    s.push(if access.contains(Access::EXECUTE) { 'x' } else { '-' });
    s
}

/// Anything carrying ownership and a permission triple
pub trait Protected {
    fn owner(&self) -> UserId;
    fn group(&self) -> GroupId;
    fn permissions(&self) -> PermissionTriple;
}

/// Selects the permission class of `identity` against an owner/group pair
pub fn permission_class(identity: Identity, owner: UserId, group: GroupId) -> PermissionClass {
    if identity.uid == owner {
        PermissionClass::Owner
    } else if identity.gid == group {
        PermissionClass::Group
    } else {
        PermissionClass::Other
    }
}

/// Returns the single digit that applies to `identity` for `target`
pub fn effective_permission<T: Protected + ?Sized>(identity: Identity, target: &T) -> u8 {
    let class = permission_class(identity, target.owner(), target.group());
    target.permissions().digit(class)
}

/// Access decision policy
///
/// Every permission check in the filesystem goes through one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionPolicy {
    /// When set, uid 0 passes every check
    pub superuser_bypass: bool,
}

impl PermissionPolicy {
    /// Creates a policy
    pub fn new(superuser_bypass: bool) -> Self {
        Self { superuser_bypass }
    }

    fn bypasses(&self, identity: Identity) -> bool {
        self.superuser_bypass && identity.uid.is_root()
    }

    /// Returns true if `identity` holds any of the `required` bits on `target`
    pub fn check_access<T: Protected + ?Sized>(
        &self,
        identity: Identity,
        target: &T,
        required: Access,
    ) -> bool {
        if self.bypasses(identity) {
            return true;
        }
        effective_permission(identity, target) & required.bits() != 0
    }

    /// Returns true if `identity` may change the permission triple of `target`
    pub fn may_change_mode<T: Protected + ?Sized>(&self, identity: Identity, target: &T) -> bool {
        self.bypasses(identity) || identity.uid == target.owner()
    }
}
