//! Sanction kinds and approval states

use serde::{Deserialize, Serialize};
use std::fmt;

/// The approval workflows a registration can be subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    RegistrationApproval,
    Embargo,
    Retraction,
    EmbargoTerminationApproval,
}

impl SanctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegistrationApproval => "registration_approval",
            Self::Embargo => "embargo",
            Self::Retraction => "retraction",
            Self::EmbargoTerminationApproval => "embargo_termination_approval",
        }
    }
}

impl fmt::Display for SanctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate state of a sanction.
///
/// `Unapproved -> PendingApproval -> {Approved, Rejected} -> Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionState {
    Unapproved,
    PendingApproval,
    Approved,
    #[serde(alias = "cancelled")]
    Rejected,
    Completed,
}

impl SanctionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unapproved => "unapproved",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    /// Still collecting authorizer decisions.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Unapproved | Self::PendingApproval)
    }

    /// No further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }
}

impl fmt::Display for SanctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authorizer's decision in a sanction's approval ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Unapproved,
    Approved,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_and_terminal_are_disjoint() {
        for state in [
            SanctionState::Unapproved,
            SanctionState::PendingApproval,
            SanctionState::Approved,
            SanctionState::Rejected,
            SanctionState::Completed,
        ] {
            assert!(!(state.is_pending() && state.is_terminal()), "{state}");
        }
        assert!(!SanctionState::Approved.is_pending());
        assert!(!SanctionState::Approved.is_terminal());
    }

    #[test]
    fn test_cancelled_alias_deserializes_to_rejected() {
        let state: SanctionState = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(state, SanctionState::Rejected);
    }
}
