//! Identifier types
//!
//! Nodes and users carry short human-friendly guids (`abc12`). Logs and
//! sanctions are keyed by UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Characters a guid may be built from. Ambiguous glyphs (0, 1, i, l, o) are excluded.
pub const GUID_ALPHABET: &str = "23456789abcdefghjkmnpqrstuvwxyz";

/// Short globally unique identifier for nodes and users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

pub type NodeId = Guid;
pub type UserId = Guid;
pub type LogId = Uuid;
pub type SanctionId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuidParseError {
    #[error("guid must not be empty")]
    Empty,

    #[error("guid '{guid}' contains invalid character '{ch}'")]
    InvalidChar { guid: String, ch: char },
}

impl Guid {
    /// Wrap a string already known to be a valid guid.
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(GuidParseError::Empty);
        }
        if let Some(ch) = s.chars().find(|c| !GUID_ALPHABET.contains(*c)) {
            return Err(GuidParseError::InvalidChar {
                guid: s.to_string(),
                ch,
            });
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Guid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
