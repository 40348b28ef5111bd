//! Applies sanction effects to the graph.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use osf_types::{LogAction, SanctionId, SanctionState, UserId};

use super::machine::{Decision, SanctionEffect};
use super::SanctionDetails;
use crate::error::ModelResult;
use crate::events::ModelEvent;
use crate::graph::NodeGraph;
use crate::nodelog::NewLog;

impl NodeGraph {
    pub(crate) fn dispatch_effects(
        &mut self,
        sanction_id: &SanctionId,
        actor: Option<&UserId>,
        effects: &[SanctionEffect],
    ) -> ModelResult<()> {
        for effect in effects {
            self.dispatch_effect(sanction_id, actor, effect)?;
        }
        Ok(())
    }

    fn dispatch_effect(
        &mut self,
        sanction_id: &SanctionId,
        actor: Option<&UserId>,
        effect: &SanctionEffect,
    ) -> ModelResult<()> {
        let sanction = self.sanction(sanction_id)?;
        let registration = sanction.registration.clone();
        let kind = sanction.kind();
        debug!(sanction = %sanction_id, ?effect, "dispatching sanction effect");

        match effect {
            SanctionEffect::NotifyAuthorizer { user, node } => {
                self.emit(ModelEvent::ApprovalRequested {
                    sanction: *sanction_id,
                    kind,
                    user: user.clone(),
                    node: node.clone(),
                });
            }
            SanctionEffect::Log(action) => {
                self.log_sanction_action(sanction_id, *action, actor)?;
            }
            SanctionEffect::MakeTreePublic => {
                for id in self.node_and_primary_descendants(&registration)? {
                    let node = self.node_mut(&id)?;
                    if !node.is_public {
                        node.is_public = true;
                        self.emit(ModelEvent::PrivacySetPublic { node: id });
                    }
                }
            }
            SanctionEffect::DeleteRegistrationTree => {
                self.delete_registration_tree(&registration)?;
            }
            SanctionEffect::MarkRetracted => {
                let sanction = self.sanction_mut(sanction_id)?;
                if let SanctionDetails::Retraction { date_retracted, .. } = &mut sanction.details {
                    *date_retracted = Some(Utc::now());
                }
                info!(registration = %registration, "registration retracted");
            }
            SanctionEffect::CancelEmbargo => {
                let embargo = self
                    .node(&registration)?
                    .registration()
                    .and_then(|info| info.embargo);
                if let Some(embargo_id) = embargo {
                    let embargo = self.sanction_mut(&embargo_id)?;
                    if !embargo.state.is_terminal() {
                        embargo.state = SanctionState::Rejected;
                        info!(embargo = %embargo_id, "embargo cancelled by retraction");
                        self.log_sanction_action(&embargo_id, LogAction::EmbargoCancelled, actor)?;
                    }
                }
            }
            SanctionEffect::TerminateEmbargo { embargo } => {
                let state = self.sanction(embargo)?.state;
                if state == SanctionState::Approved {
                    self.apply_decision(embargo, Decision::Terminate)?;
                } else {
                    warn!(embargo = %embargo, state = %state, "embargo already ended, nothing to terminate");
                }
            }
            SanctionEffect::CloseTerminationRequest => {
                let request = self
                    .node(&registration)?
                    .registration()
                    .and_then(|info| info.embargo_termination_approval);
                if let Some(request_id) = request {
                    let request = self.sanction_mut(&request_id)?;
                    if request.state.is_pending() {
                        request.state = SanctionState::Rejected;
                        info!(request = %request_id, "embargo ended, termination request closed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Log a sanction action on the live node the registration came from,
    /// or on the registration itself once that link is gone.
    pub(crate) fn log_sanction_action(
        &mut self,
        sanction_id: &SanctionId,
        action: LogAction,
        actor: Option<&UserId>,
    ) -> ModelResult<()> {
        let sanction = self.sanction(sanction_id)?;
        let registration = sanction.registration.clone();
        let id_key = format!("{}_id", sanction.kind().as_str());
        let source = self
            .node(&registration)?
            .registered_from()
            .filter(|id| self.nodes.contains_key(*id))
            .cloned();
        let target = source.clone().unwrap_or_else(|| registration.clone());

        let mut params = json!({
            "node": source,
            "registration": registration,
        });
        params[id_key] = json!(sanction_id);
        let mut entry = NewLog::new(action).params(params);
        if let Some(user) = actor {
            entry = entry.user(user);
        }
        self.add_log(&target, entry)?;
        Ok(())
    }
}
