//! Draft registrations
//!
//! A draft collects answers to a registration schema against a live node
//! before it is registered. Schemas that require approval route the draft
//! through a single-reviewer approval first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use osf_types::{ApprovalStatus, NodeId, UserId};

use crate::error::{ModelError, ModelResult};
use crate::graph::{NodeGraph, RegistrationSchema};

/// Answers keyed by question id: `{ "value": .., "comments": [..] }`.
pub type DraftMetadata = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftAction {
    Submitted,
    Registered,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftStatusLog {
    pub action: DraftAction,
    pub user: UserId,
    pub date: DateTime<Utc>,
}

/// Review of a submitted draft. One reviewer decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftApproval {
    pub initiated_by: UserId,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub meta: Value,
    pub reviewer: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRegistration {
    pub id: Uuid,
    pub branched_from: NodeId,
    pub initiator: UserId,
    pub schema: RegistrationSchema,
    pub metadata: DraftMetadata,
    #[serde(default)]
    pub notes: String,
    pub approval: Option<DraftApproval>,
    pub registered_node: Option<NodeId>,
    pub datetime_initiated: DateTime<Utc>,
    pub datetime_updated: DateTime<Utc>,
    pub status_logs: Vec<DraftStatusLog>,
}

impl DraftRegistration {
    pub fn requires_approval(&self) -> bool {
        self.schema.requires_approval
    }

    pub fn is_pending_review(&self) -> bool {
        self.requires_approval()
            && self
                .approval
                .as_ref()
                .is_some_and(|a| a.status == ApprovalStatus::Unapproved)
    }

    pub fn is_approved(&self) -> bool {
        self.requires_approval()
            && self
                .approval
                .as_ref()
                .is_some_and(|a| a.status == ApprovalStatus::Approved)
    }

    pub fn is_rejected(&self) -> bool {
        self.requires_approval()
            && self
                .approval
                .as_ref()
                .is_some_and(|a| a.status == ApprovalStatus::Rejected)
    }

    /// Merge `incoming` answers, returning the ids of questions whose value
    /// changed or that were newly answered. Comment threads are merged by
    /// their `created` stamp; an approved draft keeps its comments as they are.
    pub fn update_metadata(&mut self, incoming: DraftMetadata) -> Vec<String> {
        let approved = self.is_approved();
        let mut changes = Vec::new();
        for (question, mut value) in incoming {
            match self.metadata.get(&question) {
                Some(old) if !old.is_null() => {
                    let comments = if approved {
                        old.get("comments").cloned().unwrap_or(Value::Array(Vec::new()))
                    } else {
                        merge_comments(old, &value)
                    };
                    if let Some(object) = value.as_object_mut() {
                        object.insert("comments".to_string(), comments);
                    }
                    if old.get("value") != value.get("value") {
                        changes.push(question.clone());
                    }
                }
                _ => changes.push(question.clone()),
            }
            self.metadata.insert(question, value);
        }
        self.datetime_updated = Utc::now();
        changes
    }

    fn add_status_log(&mut self, user: &UserId, action: DraftAction) {
        self.status_logs.push(DraftStatusLog {
            action,
            user: user.clone(),
            date: Utc::now(),
        });
    }
}

/// Union of both comment threads keyed by `created`, newer entries winning,
/// sorted by `created`.
fn merge_comments(old: &Value, new: &Value) -> Value {
    let mut merged: BTreeMap<String, Value> = BTreeMap::new();
    for source in [old, new] {
        let thread = source.get("comments").and_then(Value::as_array);
        for comment in thread.into_iter().flatten() {
            let created = comment
                .get("created")
                .map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string()))
                .unwrap_or_default();
            merged.insert(created, comment.clone());
        }
    }
    Value::Array(merged.into_values().collect())
}

impl NodeGraph {
    pub fn create_draft(
        &mut self,
        node: &NodeId,
        user: &UserId,
        schema: RegistrationSchema,
        data: Option<DraftMetadata>,
    ) -> ModelResult<Uuid> {
        let record = self.node(node)?;
        if record.is_registration() || record.is_collection() {
            return Err(ModelError::node_state(
                "Drafts can only be started from projects and components",
            ));
        }
        if !self.can_edit(node, user) {
            return Err(ModelError::permissions("Must have write access to start a draft"));
        }
        let now = Utc::now();
        let draft = DraftRegistration {
            id: Uuid::new_v4(),
            branched_from: node.clone(),
            initiator: user.clone(),
            schema,
            metadata: data.unwrap_or_default(),
            notes: String::new(),
            approval: None,
            registered_node: None,
            datetime_initiated: now,
            datetime_updated: now,
            status_logs: Vec::new(),
        };
        let id = draft.id;
        self.drafts.insert(id, draft);
        Ok(id)
    }

    pub fn draft(&self, id: &Uuid) -> ModelResult<&DraftRegistration> {
        self.drafts
            .get(id)
            .ok_or_else(|| ModelError::not_found("draft registration", id))
    }

    fn draft_mut(&mut self, id: &Uuid) -> ModelResult<&mut DraftRegistration> {
        self.drafts
            .get_mut(id)
            .ok_or_else(|| ModelError::not_found("draft registration", id))
    }

    pub fn update_draft_metadata(
        &mut self,
        id: &Uuid,
        metadata: DraftMetadata,
    ) -> ModelResult<Vec<String>> {
        let draft = self.draft_mut(id)?;
        if draft.registered_node.is_some() {
            return Err(ModelError::node_state("Draft has already been registered"));
        }
        Ok(draft.update_metadata(metadata))
    }

    pub fn submit_for_review(&mut self, id: &Uuid, user: &UserId, meta: Value) -> ModelResult<()> {
        let draft = self.draft(id)?;
        if !draft.requires_approval() {
            return Err(ModelError::node_state(format!(
                "Schema {} does not require review",
                draft.schema.id
            )));
        }
        if draft.is_pending_review() || draft.is_approved() {
            return Err(ModelError::node_state("Draft is already under review"));
        }
        if !self.can_edit(&draft.branched_from, user) {
            return Err(ModelError::permissions("Must have write access to submit a draft"));
        }
        let draft = self.draft_mut(id)?;
        draft.approval = Some(DraftApproval {
            initiated_by: user.clone(),
            status: ApprovalStatus::Unapproved,
            meta,
            reviewer: None,
        });
        draft.add_status_log(user, DraftAction::Submitted);
        info!(draft = %id, user = %user, "draft submitted for review");
        Ok(())
    }

    pub fn approve_draft(&mut self, id: &Uuid, reviewer: &UserId) -> ModelResult<()> {
        self.review_draft(id, reviewer, ApprovalStatus::Approved)
    }

    pub fn reject_draft(&mut self, id: &Uuid, reviewer: &UserId) -> ModelResult<()> {
        self.review_draft(id, reviewer, ApprovalStatus::Rejected)
    }

    fn review_draft(
        &mut self,
        id: &Uuid,
        reviewer: &UserId,
        decision: ApprovalStatus,
    ) -> ModelResult<()> {
        if !self.user(reviewer)?.is_active {
            return Err(ModelError::permissions("Inactive users cannot review drafts"));
        }
        let draft = self.draft_mut(id)?;
        let approval = draft
            .approval
            .as_mut()
            .filter(|a| a.status == ApprovalStatus::Unapproved)
            .ok_or_else(|| ModelError::node_state("Draft is not pending review"))?;
        approval.status = decision;
        approval.reviewer = Some(reviewer.clone());
        let action = match decision {
            ApprovalStatus::Approved => DraftAction::Approved,
            _ => DraftAction::Rejected,
        };
        draft.add_status_log(reviewer, action);
        info!(draft = %id, reviewer = %reviewer, ?action, "draft reviewed");
        Ok(())
    }

    /// Register the draft's node with the draft's schema and answers.
    pub fn register_draft(&mut self, id: &Uuid, user: &UserId) -> ModelResult<NodeId> {
        let draft = self.draft(id)?;
        if draft.registered_node.is_some() {
            return Err(ModelError::node_state("Draft has already been registered"));
        }
        if draft.requires_approval() && !draft.is_approved() {
            return Err(ModelError::node_state(
                "This draft must be approved before it can be registered",
            ));
        }
        let source = draft.branched_from.clone();
        let schema = draft.schema.clone();
        let answers = Value::Object(draft.metadata.clone());

        let registration = self.register_node(&source, &schema, user, answers, None)?;
        let draft = self.draft_mut(id)?;
        draft.registered_node = Some(registration.clone());
        draft.add_status_log(user, DraftAction::Registered);
        Ok(registration)
    }
}
