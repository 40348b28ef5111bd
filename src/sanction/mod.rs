//! Sanctions
//!
//! A sanction gates a sensitive change to a registration behind the approval
//! of every admin in the registration tree. The decision logic is the pure
//! function [`machine::decide`]; [`effects`] applies the resulting effects to
//! the graph; [`sweep`] holds the periodic jobs that approve stale sanctions
//! and release embargoes whose end date passed.

pub mod effects;
pub mod machine;
pub mod sweep;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use osf_types::{ApprovalStatus, NodeId, SanctionId, SanctionKind, SanctionState, UserId};

use crate::error::{ModelError, ModelResult};
use crate::graph::NodeGraph;
use crate::identity::generate_token;

pub use machine::{decide, Decision, SanctionEffect, Transition};

/// One admin's entry in a sanction's approval ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorizer {
    pub user: UserId,
    /// Node on which `user` holds the admin role that made them an authorizer.
    pub node: NodeId,
    pub status: ApprovalStatus,
    pub approval_token: String,
    pub rejection_token: String,
}

/// Kind-specific sanction data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SanctionDetails {
    RegistrationApproval,
    Embargo {
        /// Embargo placed on a registration that already existed, as
        /// opposed to one chosen at registration time.
        for_existing_registration: bool,
    },
    Retraction {
        justification: Option<String>,
        date_retracted: Option<DateTime<Utc>>,
    },
    EmbargoTerminationApproval {
        embargo: SanctionId,
    },
}

impl SanctionDetails {
    pub fn kind(&self) -> SanctionKind {
        match self {
            Self::RegistrationApproval => SanctionKind::RegistrationApproval,
            Self::Embargo { .. } => SanctionKind::Embargo,
            Self::Retraction { .. } => SanctionKind::Retraction,
            Self::EmbargoTerminationApproval { .. } => SanctionKind::EmbargoTerminationApproval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sanction {
    pub id: SanctionId,
    /// Root registration the sanction is attached to.
    pub registration: NodeId,
    pub state: SanctionState,
    pub initiated_by: Option<UserId>,
    pub initiation_date: DateTime<Utc>,
    /// Embargo lift date. Unset for the other kinds.
    pub end_date: Option<DateTime<Utc>>,
    /// Authorizers in the order they were added.
    pub ledger: Vec<Authorizer>,
    pub details: SanctionDetails,
}

impl Sanction {
    pub fn new(
        registration: &NodeId,
        details: SanctionDetails,
        initiated_by: Option<&UserId>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            registration: registration.clone(),
            state: SanctionState::Unapproved,
            initiated_by: initiated_by.cloned(),
            initiation_date: Utc::now(),
            end_date,
            ledger: Vec::new(),
            details,
        }
    }

    pub fn kind(&self) -> SanctionKind {
        self.details.kind()
    }

    pub fn authorizer(&self, user: &UserId) -> Option<&Authorizer> {
        self.ledger.iter().find(|a| &a.user == user)
    }

    /// Add `user` to the ledger with fresh tokens. A user already in the
    /// ledger keeps their entry and `false` is returned.
    pub fn add_authorizer(&mut self, user: &UserId, node: &NodeId) -> bool {
        if self.authorizer(user).is_some() {
            return false;
        }
        self.ledger.push(Authorizer {
            user: user.clone(),
            node: node.clone(),
            status: ApprovalStatus::Unapproved,
            approval_token: generate_token(),
            rejection_token: generate_token(),
        });
        true
    }

    pub fn remove_authorizer(&mut self, user: &UserId) -> bool {
        if !self.state.is_pending() {
            return false;
        }
        let before = self.ledger.len();
        self.ledger.retain(|a| &a.user != user);
        self.ledger.len() != before
    }

    pub fn approval_token(&self, user: &UserId) -> Option<&str> {
        self.authorizer(user).map(|a| a.approval_token.as_str())
    }

    pub fn rejection_token(&self, user: &UserId) -> Option<&str> {
        self.authorizer(user).map(|a| a.rejection_token.as_str())
    }

    pub fn is_approved_by_all(&self) -> bool {
        !self.ledger.is_empty()
            && self
                .ledger
                .iter()
                .all(|a| a.status == ApprovalStatus::Approved)
    }

    pub fn for_existing_registration(&self) -> bool {
        matches!(
            self.details,
            SanctionDetails::Embargo {
                for_existing_registration: true
            }
        )
    }
}

impl NodeGraph {
    /// Record `user`'s approval. Returns the resulting aggregate state.
    pub fn approve_sanction(
        &mut self,
        sanction: &SanctionId,
        user: &UserId,
        token: &str,
    ) -> ModelResult<SanctionState> {
        self.apply_decision(
            sanction,
            Decision::Approve {
                user: user.clone(),
                token: token.to_string(),
            },
        )
    }

    /// Record `user`'s rejection. A single rejection ends the sanction.
    pub fn reject_sanction(
        &mut self,
        sanction: &SanctionId,
        user: &UserId,
        token: &str,
    ) -> ModelResult<SanctionState> {
        self.apply_decision(
            sanction,
            Decision::Reject {
                user: user.clone(),
                token: token.to_string(),
            },
        )
    }

    /// Run a decision through the state machine, store the new ledger and
    /// state, then dispatch the effects.
    pub(crate) fn apply_decision(
        &mut self,
        sanction_id: &SanctionId,
        decision: Decision,
    ) -> ModelResult<SanctionState> {
        let sanction = self.sanction(sanction_id)?;
        let transition = decide(sanction, &decision)?;
        let from = sanction.state;
        let kind = sanction.kind();

        let record = self.sanction_mut(sanction_id)?;
        record.state = transition.state;
        record.ledger = transition.ledger;
        if from != transition.state {
            info!(
                sanction = %sanction_id,
                kind = %kind,
                from = %from,
                to = %transition.state,
                "sanction transition"
            );
        }
        self.dispatch_effects(sanction_id, transition.actor.as_ref(), &transition.effects)?;
        Ok(transition.state)
    }

    /// Store a new sanction, load its ledger with every active admin of
    /// the registration tree, and ask them for a decision.
    pub(crate) fn open_sanction(&mut self, mut sanction: Sanction) -> ModelResult<SanctionId> {
        for (admin, node) in self.admin_contributors_recursive(&sanction.registration)? {
            sanction.add_authorizer(&admin, &node);
        }
        if sanction.ledger.is_empty() {
            return Err(ModelError::node_state(format!(
                "Registration {} has no active admins to approve a {}",
                sanction.registration,
                sanction.kind()
            )));
        }
        let id = sanction.id;
        info!(
            sanction = %id,
            kind = %sanction.kind(),
            registration = %sanction.registration,
            authorizers = sanction.ledger.len(),
            "sanction initiated"
        );
        self.sanctions.insert(id, sanction);
        self.apply_decision(&id, Decision::Ask)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new_unchecked(id)
    }

    #[test]
    fn test_authorizers_are_deduplicated_by_user() {
        let reg = NodeId::new_unchecked("rrrrr");
        let mut sanction = Sanction::new(&reg, SanctionDetails::RegistrationApproval, None, None);
        assert!(sanction.add_authorizer(&user("aaaaa"), &reg));
        assert!(!sanction.add_authorizer(&user("aaaaa"), &NodeId::new_unchecked("ccccc")));
        assert!(sanction.add_authorizer(&user("bbbbb"), &reg));

        assert_eq!(sanction.ledger.len(), 2);
        assert_eq!(sanction.authorizer(&user("aaaaa")).unwrap().node, reg);
    }

    #[test]
    fn test_tokens_are_distinct_per_purpose_and_user() {
        let reg = NodeId::new_unchecked("rrrrr");
        let mut sanction = Sanction::new(
            &reg,
            SanctionDetails::Embargo {
                for_existing_registration: false,
            },
            None,
            None,
        );
        sanction.add_authorizer(&user("aaaaa"), &reg);
        sanction.add_authorizer(&user("bbbbb"), &reg);

        let a_approve = sanction.approval_token(&user("aaaaa")).unwrap();
        let a_reject = sanction.rejection_token(&user("aaaaa")).unwrap();
        let b_approve = sanction.approval_token(&user("bbbbb")).unwrap();
        assert_ne!(a_approve, a_reject);
        assert_ne!(a_approve, b_approve);
        assert_eq!(a_approve.len(), 30);
    }

    #[test]
    fn test_empty_ledger_is_never_approved() {
        let reg = NodeId::new_unchecked("rrrrr");
        let sanction = Sanction::new(&reg, SanctionDetails::RegistrationApproval, None, None);
        assert!(!sanction.is_approved_by_all());
    }

    #[test]
    fn test_details_serialize_with_kind_tag() {
        let details = SanctionDetails::Retraction {
            justification: Some("Data fabricated".into()),
            date_retracted: None,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "retraction");
        assert_eq!(details.kind(), SanctionKind::Retraction);
    }
}
