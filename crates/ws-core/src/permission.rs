use serde::{Deserialize, Serialize};
use std::fmt;

/// A workspace access level, ordered by [`Permission::rank`].
///
/// `Public` and `Owner` never appear as a *user*-specific grant: `Public` is
/// only meaningful as a workspace's `global_permission`, and `Owner` is never
/// stored — it is computed for whoever created the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// No access (`n`).
    None,
    /// World-readable (`p`); only valid as a workspace's global permission.
    Public,
    /// Read access (`r`).
    Read,
    /// Read/write access (`w`).
    Write,
    /// Administrative access (`a`): may change permissions and metadata.
    Admin,
    /// The workspace owner (`o`); computed, never stored.
    Owner,
}

impl Permission {
    /// The numeric rank used to compare two permissions; higher is more privileged.
    /// `Public` ranks alongside `Read` since a public workspace is readable by anyone.
    pub fn rank(self) -> u8 {
        match self {
            Permission::None => 0,
            Permission::Public => 1,
            Permission::Read => 1,
            Permission::Write => 2,
            Permission::Admin => 3,
            Permission::Owner => 4,
        }
    }

    /// Parses the single-character wire code used in requests and stored permission maps.
    pub fn from_wire(c: &str) -> Option<Permission> {
        match c {
            "n" => Some(Permission::None),
            "r" => Some(Permission::Read),
            "w" => Some(Permission::Write),
            "a" => Some(Permission::Admin),
            "p" => Some(Permission::Public),
            "o" => Some(Permission::Owner),
            _ => None,
        }
    }

    /// The single-character wire code for this permission.
    pub fn to_wire(self) -> &'static str {
        match self {
            Permission::None => "n",
            Permission::Read => "r",
            Permission::Write => "w",
            Permission::Admin => "a",
            Permission::Public => "p",
            Permission::Owner => "o",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

impl PartialOrd for Permission {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.rank().cmp(&other.rank()))
    }
}

impl Ord for Permission {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rank_ordering_matches_spec() {
        assert!(Permission::None < Permission::Public);
        assert!(Permission::Public == Permission::Read || Permission::Public < Permission::Read);
        assert_eq!(Permission::Public.rank(), Permission::Read.rank());
        assert!(Permission::Read < Permission::Write);
        assert!(Permission::Write < Permission::Admin);
        assert!(Permission::Admin < Permission::Owner);
    }

    #[test]
    fn wire_round_trip() {
        for p in [
            Permission::None,
            Permission::Read,
            Permission::Write,
            Permission::Admin,
            Permission::Public,
            Permission::Owner,
        ] {
            assert_eq!(Permission::from_wire(p.to_wire()), Some(p));
        }
    }
}
