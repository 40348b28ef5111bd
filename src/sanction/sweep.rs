//! Periodic sanction jobs
//!
//! Run by the `sanction_sweeper` binary (or any scheduler) against the
//! committed graph. Each sweep returns the sanctions it moved.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use osf_types::{SanctionId, SanctionKind, SanctionState};

use super::machine::Decision;
use crate::error::ModelResult;
use crate::graph::NodeGraph;

/// Result of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub approved: Vec<SanctionId>,
    pub completed: Vec<SanctionId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.approved.is_empty() && self.completed.is_empty()
    }
}

impl NodeGraph {
    /// Approve every pending sanction whose approval window has elapsed at
    /// `now`. Sanctions on deleted registrations are skipped.
    pub fn approve_expired_pending(&mut self, now: DateTime<Utc>) -> ModelResult<Vec<SanctionId>> {
        let policy = &self.config.sanctions;
        let due: Vec<SanctionId> = self
            .sanctions
            .values()
            .filter(|s| s.state.is_pending())
            .filter(|s| now - s.initiation_date >= policy.pending_window(s.kind()))
            .filter(|s| self.nodes.get(&s.registration).is_some_and(|n| !n.is_deleted))
            .map(|s| s.id)
            .collect();

        let mut approved = Vec::with_capacity(due.len());
        for id in due {
            // An earlier approval in this pass may already have moved it.
            if !self.sanction(&id)?.state.is_pending() {
                continue;
            }
            self.apply_decision(&id, Decision::Expire)?;
            approved.push(id);
        }
        if !approved.is_empty() {
            info!(count = approved.len(), "expired sanctions approved");
        }
        Ok(approved)
    }

    /// Lift every approved embargo whose end date is at or before `now`.
    pub fn complete_due_embargoes(&mut self, now: DateTime<Utc>) -> ModelResult<Vec<SanctionId>> {
        let due: Vec<SanctionId> = self
            .sanctions
            .values()
            .filter(|s| s.kind() == SanctionKind::Embargo && s.state == SanctionState::Approved)
            .filter(|s| s.end_date.is_some_and(|end| end <= now))
            .map(|s| s.id)
            .collect();

        let mut completed = Vec::with_capacity(due.len());
        for id in due {
            let registration = self.sanction(&id)?.registration.clone();
            if self.node(&registration)?.is_deleted {
                warn!(embargo = %id, registration = %registration, "skipping embargo on deleted registration");
                continue;
            }
            self.apply_decision(&id, Decision::Complete)?;
            completed.push(id);
        }
        if !completed.is_empty() {
            info!(count = completed.len(), "embargoes completed");
        }
        Ok(completed)
    }

    /// Both sweeps, approvals first so an embargo approved by expiry in this
    /// pass can complete in the same pass.
    pub fn sweep_sanctions(&mut self, now: DateTime<Utc>) -> ModelResult<SweepReport> {
        let approved = self.approve_expired_pending(now)?;
        let completed = self.complete_due_embargoes(now)?;
        Ok(SweepReport {
            approved,
            completed,
        })
    }
}
