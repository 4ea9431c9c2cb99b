//! Unique identifiers for filesystem entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an entry in the namespace tree
///
/// Entry ids are handed out in strictly increasing order by the tree that
/// owns them and are never reused within that tree's lifetime. They play the
/// role of inode numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    /// Creates an entry id from its raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// The superuser id
    pub const ROOT: UserId = UserId(0);

    /// Returns true for uid 0
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric group id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The acting identity of a session
///
/// Exactly one group per identity; there are no supplementary groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub uid: UserId,
    pub gid: GroupId,
}

impl Identity {
    /// Creates an identity from raw uid and gid values
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid: UserId(uid),
            gid: GroupId(gid),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid={} gid={}", self.uid, self.gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_ordering() {
        let a = EntryId::new(1);
        let b = a.next();
        assert!(b > a);
        assert_eq!(b.as_u64(), 2);
    }

    #[test]
    fn test_root_user() {
        assert!(UserId(0).is_root());
        assert!(!UserId(1).is_root());
    }

    #[test]
    fn test_identity_display() {
        let identity = Identity::new(2, 7);
        assert_eq!(identity.to_string(), "uid=2 gid=7");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let identity = Identity::new(3, 4);
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(json, r#"{"uid":3,"gid":4}"#);

        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }
}
