//! Sanction state machine
//!
//! `decide` maps the current sanction and a decision to the next aggregate
//! state, the updated ledger and the effects to apply. It reads nothing but
//! its arguments and writes nothing, so every rule can be tested without a
//! graph.

use osf_types::{ApprovalStatus, LogAction, NodeId, SanctionId, SanctionKind, SanctionState, UserId};

use super::{Authorizer, Sanction, SanctionDetails};
use crate::error::{ModelError, ModelResult, TokenPurpose};

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Ask every authorizer in the ledger for a decision.
    Ask,
    Approve { user: UserId, token: String },
    Reject { user: UserId, token: String },
    /// The approval window elapsed without a rejection.
    Expire,
    /// Early release of an approved embargo.
    Terminate,
    /// An approved embargo reached its end date.
    Complete,
}

/// Side effect to run against the graph once the new state is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanctionEffect {
    NotifyAuthorizer { user: UserId, node: NodeId },
    /// Log on the live node the registration was made from.
    Log(LogAction),
    MakeTreePublic,
    DeleteRegistrationTree,
    MarkRetracted,
    /// Cancel any embargo still attached to the registration.
    CancelEmbargo,
    TerminateEmbargo { embargo: SanctionId },
    /// Reject a still-pending request to end the embargo early.
    CloseTerminationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SanctionState,
    pub ledger: Vec<Authorizer>,
    pub effects: Vec<SanctionEffect>,
    /// User whose decision caused the transition, if any.
    pub actor: Option<UserId>,
}

pub fn decide(sanction: &Sanction, decision: &Decision) -> ModelResult<Transition> {
    let mut ledger = sanction.ledger.clone();
    match decision {
        Decision::Ask => {
            if sanction.state != SanctionState::Unapproved {
                return Err(ModelError::node_state(format!(
                    "Approval for {} {} was already requested",
                    sanction.kind(),
                    sanction.id
                )));
            }
            if ledger.is_empty() {
                return Err(ModelError::node_state("Sanction has no authorizers"));
            }
            let effects = ledger
                .iter()
                .map(|a| SanctionEffect::NotifyAuthorizer {
                    user: a.user.clone(),
                    node: a.node.clone(),
                })
                .collect();
            Ok(Transition {
                state: SanctionState::PendingApproval,
                ledger,
                effects,
                actor: None,
            })
        }
        Decision::Approve { user, token } => {
            ensure_pending(sanction)?;
            let entry = ledger_entry(&mut ledger, sanction.id, user)?;
            if entry.approval_token != *token {
                return Err(invalid_token(TokenPurpose::Approval, user, sanction.id));
            }
            entry.status = ApprovalStatus::Approved;
            let all_approved = ledger.iter().all(|a| a.status == ApprovalStatus::Approved);
            let (state, effects) = if all_approved {
                (SanctionState::Approved, on_approved(sanction))
            } else {
                (SanctionState::PendingApproval, Vec::new())
            };
            Ok(Transition {
                state,
                ledger,
                effects,
                actor: Some(user.clone()),
            })
        }
        Decision::Reject { user, token } => {
            ensure_pending(sanction)?;
            let entry = ledger_entry(&mut ledger, sanction.id, user)?;
            if entry.rejection_token != *token {
                return Err(invalid_token(TokenPurpose::Rejection, user, sanction.id));
            }
            entry.status = ApprovalStatus::Rejected;
            Ok(Transition {
                state: SanctionState::Rejected,
                ledger,
                effects: on_rejected(sanction),
                actor: Some(user.clone()),
            })
        }
        Decision::Expire => {
            ensure_pending(sanction)?;
            for entry in &mut ledger {
                entry.status = ApprovalStatus::Approved;
            }
            Ok(Transition {
                state: SanctionState::Approved,
                ledger,
                effects: on_approved(sanction),
                actor: None,
            })
        }
        Decision::Terminate | Decision::Complete => {
            if sanction.kind() != SanctionKind::Embargo
                || sanction.state != SanctionState::Approved
            {
                return Err(ModelError::node_state(
                    "No active embargo found for this registration",
                ));
            }
            let action = if *decision == Decision::Terminate {
                LogAction::EmbargoTerminated
            } else {
                LogAction::EmbargoCompleted
            };
            Ok(Transition {
                state: SanctionState::Completed,
                ledger,
                effects: vec![
                    SanctionEffect::Log(action),
                    SanctionEffect::MakeTreePublic,
                    SanctionEffect::CloseTerminationRequest,
                ],
                actor: None,
            })
        }
    }
}

fn ensure_pending(sanction: &Sanction) -> ModelResult<()> {
    if sanction.state.is_pending() {
        Ok(())
    } else {
        Err(ModelError::node_state(format!(
            "{} {} is {} and no longer accepts decisions",
            sanction.kind(),
            sanction.id,
            sanction.state
        )))
    }
}

fn ledger_entry<'a>(
    ledger: &'a mut [Authorizer],
    sanction: SanctionId,
    user: &UserId,
) -> ModelResult<&'a mut Authorizer> {
    ledger
        .iter_mut()
        .find(|a| &a.user == user)
        .ok_or_else(|| {
            ModelError::permissions(format!(
                "User {} is not an authorizer of sanction {}",
                user, sanction
            ))
        })
}

fn invalid_token(purpose: TokenPurpose, user: &UserId, sanction: SanctionId) -> ModelError {
    ModelError::InvalidToken {
        purpose,
        user: user.clone(),
        sanction,
    }
}

fn on_approved(sanction: &Sanction) -> Vec<SanctionEffect> {
    use SanctionEffect::*;
    match &sanction.details {
        SanctionDetails::RegistrationApproval => {
            vec![MakeTreePublic, Log(LogAction::RegistrationApprovalApproved)]
        }
        SanctionDetails::Embargo { .. } => vec![Log(LogAction::EmbargoApproved)],
        SanctionDetails::Retraction { .. } => vec![
            Log(LogAction::RetractionApproved),
            MarkRetracted,
            CancelEmbargo,
            MakeTreePublic,
        ],
        SanctionDetails::EmbargoTerminationApproval { embargo } => {
            vec![TerminateEmbargo { embargo: *embargo }]
        }
    }
}

fn on_rejected(sanction: &Sanction) -> Vec<SanctionEffect> {
    use SanctionEffect::*;
    match &sanction.details {
        SanctionDetails::RegistrationApproval => vec![
            Log(LogAction::RegistrationApprovalCancelled),
            DeleteRegistrationTree,
        ],
        SanctionDetails::Embargo {
            for_existing_registration,
        } => {
            let mut effects = vec![Log(LogAction::EmbargoCancelled)];
            if !for_existing_registration {
                effects.push(DeleteRegistrationTree);
            }
            effects
        }
        SanctionDetails::Retraction { .. } => vec![Log(LogAction::RetractionCancelled)],
        SanctionDetails::EmbargoTerminationApproval { .. } => Vec::new(),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const ADMINS: [&str; 3] = ["aaaaa", "bbbbb", "ccccc"];

    fn pending() -> Sanction {
        let reg = NodeId::new_unchecked("rrrrr");
        let mut sanction = Sanction::new(
            &reg,
            SanctionDetails::Embargo {
                for_existing_registration: true,
            },
            None,
            None,
        );
        for admin in ADMINS {
            sanction.add_authorizer(&UserId::new_unchecked(admin), &reg);
        }
        let t = decide(&sanction, &Decision::Ask).unwrap();
        sanction.state = t.state;
        sanction
    }

    fn decision_for(sanction: &Sanction, admin: usize, rejects: bool) -> Decision {
        let user = UserId::new_unchecked(ADMINS[admin]);
        if rejects {
            Decision::Reject {
                token: sanction.rejection_token(&user).unwrap().to_string(),
                user,
            }
        } else {
            Decision::Approve {
                token: sanction.approval_token(&user).unwrap().to_string(),
                user,
            }
        }
    }

    proptest! {
        /// Approved exactly when all three approve, whatever the order; any
        /// rejection ends in Rejected and later approvals cannot revive it.
        #[test]
        fn aggregate_state_is_order_independent(
            order in Just(vec![0usize, 1, 2]).prop_shuffle(),
            rejecter in proptest::option::of(0usize..3),
        ) {
            let mut sanction = pending();
            let mut rejected = false;
            for (position, admin) in order.iter().enumerate() {
                let decision = decision_for(&sanction, *admin, rejecter == Some(*admin));
                match decide(&sanction, &decision) {
                    Ok(t) => {
                        prop_assert!(!rejected);
                        sanction.state = t.state;
                        sanction.ledger = t.ledger;
                    }
                    Err(ModelError::NodeState(_)) => prop_assert!(rejected),
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
                if rejecter == Some(*admin) {
                    rejected = true;
                }
                if !rejected && position < 2 {
                    prop_assert_eq!(sanction.state, SanctionState::PendingApproval);
                }
            }
            let expected = if rejecter.is_some() {
                SanctionState::Rejected
            } else {
                SanctionState::Approved
            };
            prop_assert_eq!(sanction.state, expected);
        }
    }
}
