//! Error handling for the OSF model layer
//!
//! Every public operation returns `Result<T, ModelError>`. The variants map to
//! the error kinds callers are expected to branch on: permission failures,
//! incompatible node state, validation failures and lookup misses.

use osf_types::{SanctionId, UserId};
use thiserror::Error;

/// Main error type for model operations
#[derive(Error, Debug)]
pub enum ModelError {
    /// Actor lacks the role required for the mutation.
    #[error("Permissions error: {0}")]
    Permissions(String),

    /// Target is in a state incompatible with the request.
    #[error("Node state error: {0}")]
    NodeState(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Only raised by internal single-result lookups.
    #[error("Multiple {kind} records match {query}")]
    MultipleResults { kind: &'static str, query: String },

    #[error("User is not affiliated with {institution}")]
    UserNotAffiliated { institution: String },

    #[error("Invalid {purpose} token for user {user} on sanction {sanction}")]
    InvalidToken {
        purpose: TokenPurpose,
        user: UserId,
        sanction: SanctionId,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ModelError {
    pub fn permissions(message: impl Into<String>) -> Self {
        Self::Permissions(message.into())
    }

    pub fn node_state(message: impl Into<String>) -> Self {
        Self::NodeState(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Validation failure carrying a human-readable message.
    pub fn value(message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::Value(message.into()))
    }
}

/// Structural and policy validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    Value(String),

    #[error("Field '{field}' may not be blank")]
    BlankField { field: &'static str },

    #[error("Field '{field}' exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid category '{0}'")]
    InvalidCategory(String),
}

/// Which token of a ledger entry was presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Approval,
    Rejection,
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approval => f.write_str("approval"),
            Self::Rejection => f.write_str("rejection"),
        }
    }
}

/// Errors from snapshot persistence
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_converts_into_model_error() {
        let err: ModelError = ValidationError::BlankField { field: "title" }.into();
        assert!(matches!(err, ModelError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation error: Field 'title' may not be blank"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = ModelError::not_found("node", "abc23");
        assert_eq!(err.to_string(), "node 'abc23' not found");
    }
}
