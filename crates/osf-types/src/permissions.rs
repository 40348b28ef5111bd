//! Contributor permission levels

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single permission level. Ordered: `Read < Write < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl Permission {
    /// Permissions granted to a contributor added without an explicit list.
    pub const DEFAULT_CONTRIBUTOR: &'static [Permission] = &[Permission::Read, Permission::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    /// Every level implied by this one, lowest first.
    pub fn expand(self) -> &'static [Permission] {
        match self {
            Self::Read => &[Permission::Read],
            Self::Write => &[Permission::Read, Permission::Write],
            Self::Admin => &[Permission::Read, Permission::Write, Permission::Admin],
        }
    }

    /// The highest level in a permission list.
    pub fn reduce(permissions: &[Permission]) -> Option<Permission> {
        permissions.iter().copied().max()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_is_monotonic() {
        assert_eq!(Permission::Admin.expand().len(), 3);
        assert!(Permission::Write.expand().contains(&Permission::Read));
        assert!(!Permission::Write.expand().contains(&Permission::Admin));
    }

    #[test]
    fn test_reduce_picks_highest() {
        assert_eq!(
            Permission::reduce(&[Permission::Read, Permission::Admin, Permission::Write]),
            Some(Permission::Admin)
        );
        assert_eq!(Permission::reduce(&[]), None);
    }
}
