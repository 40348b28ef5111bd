//! Registration engine
//!
//! `register_node` freezes a live node and its non-deleted primary
//! descendants into a congruent tree of registrations. The rest of the module
//! opens sanctions against a registration tree and answers the status
//! questions those sanctions imply. A child registration inherits its
//! sanctions from the nearest registration ancestor that has one.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use osf_types::{LogAction, NodeId, Permission, Privacy, SanctionId, SanctionKind, UserId};

use crate::error::{ModelError, ModelResult};
use crate::events::ModelEvent;
use crate::graph::{Node, NodeGraph, NodeKind, RegistrationInfo, RegistrationSchema};
use crate::nodelog::NewLog;
use crate::sanction::{Decision, Sanction, SanctionDetails};

impl NodeGraph {
    /// Register `source` and its non-deleted primary descendants.
    ///
    /// Every precondition across the subtree is checked before the first
    /// write, so a failure leaves the graph untouched. Node-links are not
    /// registered; each registration carries its source's links, still
    /// pointing at the live targets.
    pub fn register_node(
        &mut self,
        source: &NodeId,
        schema: &RegistrationSchema,
        user: &UserId,
        answers: Value,
        parent: Option<&NodeId>,
    ) -> ModelResult<NodeId> {
        if let Some(parent_id) = parent {
            if !self.node(parent_id)?.is_registration() {
                return Err(ModelError::node_state(
                    "A registration can only be nested under another registration",
                ));
            }
        }
        for id in self.registrable_subtree(source)? {
            self.check_registrable(&id, user)?;
        }

        let registration = self.clone_into_registration(source, schema, user, &answers, parent)?;

        if self.config.enable_archiver && parent.is_none() {
            self.emit(ModelEvent::AfterCreateRegistration {
                registration: registration.clone(),
                source: source.clone(),
                archive: true,
            });
        }
        info!(
            source = %source,
            registration = %registration,
            schema = %schema.id,
            user = %user,
            "registration created"
        );
        Ok(registration)
    }

    /// The source node and every non-deleted primary descendant reachable
    /// through non-deleted nodes.
    fn registrable_subtree(&self, source: &NodeId) -> ModelResult<Vec<NodeId>> {
        let mut out = vec![source.clone()];
        let mut index = 0;
        while index < out.len() {
            let current = out[index].clone();
            for child in self.nodes_primary(&current) {
                if !self.node(&child)?.is_deleted {
                    out.push(child);
                }
            }
            index += 1;
        }
        Ok(out)
    }

    fn check_registrable(&self, id: &NodeId, user: &UserId) -> ModelResult<()> {
        let node = self.node(id)?;
        if !(self.can_edit(id, user) || self.is_admin_parent(id, user)) {
            return Err(ModelError::permissions(format!(
                "User {} may not register node {}",
                user, id
            )));
        }
        if node.is_collection() {
            return Err(ModelError::node_state("Collections may not be registered"));
        }
        if node.is_registration() {
            return Err(ModelError::node_state("Registrations may not be registered again"));
        }
        if node.is_deleted {
            return Err(ModelError::node_state("Cannot register deleted node"));
        }
        Ok(())
    }

    fn clone_into_registration(
        &mut self,
        source: &NodeId,
        schema: &RegistrationSchema,
        user: &UserId,
        answers: &Value,
        parent: Option<&NodeId>,
    ) -> ModelResult<NodeId> {
        let now = Utc::now();
        let id = self.allocate_guid();
        let original = self.node(source)?;
        let parent_node = original.parent.clone();
        let registered = Node {
            id: id.clone(),
            root: id.clone(),
            kind: NodeKind::Registration(Box::new(RegistrationInfo {
                registered_date: now,
                registered_user: Some(user.clone()),
                registered_schema: Vec::new(),
                registered_meta: Default::default(),
                registered_from: Some(source.clone()),
                registration_approval: None,
                embargo: None,
                retraction: None,
                embargo_termination_approval: None,
            })),
            is_public: false,
            is_deleted: false,
            deleted_date: None,
            date_created: now,
            date_modified: now,
            parent: parent.cloned(),
            // The license is copied by value: later edits to the source
            // license leave the registration alone.
            ..original.clone()
        };
        self.nodes.insert(id.clone(), registered);
        if let Some(parent_id) = parent {
            self.children
                .entry(parent_id.clone())
                .or_default()
                .push(id.clone());
        }
        self.save(&id)?;
        self.attach_schema(&id, schema, answers.clone())?;
        self.copy_contributors_from(source, &id);
        let links = self.nodes_pointer(source);
        if !links.is_empty() {
            self.node_links.insert(id.clone(), links);
        }

        let source_logs: Vec<_> = self.logs_for(source).iter().map(|l| l.id).collect();
        for log_id in &source_logs {
            self.clone_node_log(log_id, &id)?;
        }
        self.add_log(
            source,
            NewLog::new(LogAction::ProjectRegistered)
                .params(json!({
                    "parent_node": parent_node,
                    "node": source,
                    "registration": id,
                }))
                .user(user)
                .at(now),
        )?;
        debug!(source = %source, registration = %id, logs = source_logs.len(), "node cloned");

        for child in self.nodes_primary(source) {
            if self.node(&child)?.is_deleted {
                continue;
            }
            self.clone_into_registration(&child, schema, user, answers, Some(&id))?;
        }
        Ok(id)
    }

    /// Record answers to `schema` on a registration. A registration may be
    /// filed against several schemas over time; answers are keyed by schema id.
    pub fn attach_schema(
        &mut self,
        registration: &NodeId,
        schema: &RegistrationSchema,
        answers: Value,
    ) -> ModelResult<()> {
        let info = self
            .node_mut(registration)?
            .registration_mut()
            .ok_or_else(|| ModelError::node_state("Node is not a registration"))?;
        if !info.registered_schema.iter().any(|s| s.id == schema.id) {
            info.registered_schema.push(schema.clone());
        }
        info.registered_meta.insert(schema.id.clone(), answers);
        Ok(())
    }

    // ── Sanction initiation ──

    /// Put a new registration behind the approval of every admin in its tree.
    pub fn require_approval(
        &mut self,
        registration: &NodeId,
        user: &UserId,
    ) -> ModelResult<SanctionId> {
        self.root_registration(registration)?;
        self.ensure_admin(registration, user, "Only admins may request registration approval")?;
        self.ensure_no_active(registration, SanctionKind::RegistrationApproval)?;

        let sanction = Sanction::new(
            registration,
            SanctionDetails::RegistrationApproval,
            Some(user),
            None,
        );
        let id = self.open_sanction(sanction)?;
        self.attach_sanction(registration, SanctionKind::RegistrationApproval, id)?;
        self.log_sanction_action(&id, LogAction::RegistrationApprovalInitiated, Some(user))?;
        Ok(id)
    }

    /// Keep a registration private until `end_date`, pending admin approval.
    pub fn embargo_registration(
        &mut self,
        registration: &NodeId,
        user: &UserId,
        end_date: DateTime<Utc>,
        for_existing_registration: bool,
    ) -> ModelResult<SanctionId> {
        self.ensure_admin(registration, user, "Only admins may embargo a registration")?;
        self.validate_embargo_end_date(end_date, Utc::now())?;
        self.root_registration(registration)?;
        self.ensure_no_active(registration, SanctionKind::Embargo)?;

        let sanction = Sanction::new(
            registration,
            SanctionDetails::Embargo {
                for_existing_registration,
            },
            Some(user),
            Some(end_date),
        );
        let id = self.open_sanction(sanction)?;
        self.attach_sanction(registration, SanctionKind::Embargo, id)?;
        self.log_sanction_action(&id, LogAction::EmbargoInitiated, Some(user))?;

        // Admin on the root is enough; child registrations may carry other admins.
        for node in self.node_and_primary_descendants(registration)? {
            if self.node(&node)?.is_public {
                self.change_privacy(&node, Privacy::Private, Some(user), true)?;
            }
        }
        Ok(id)
    }

    /// Check `end_date` against the configured embargo window from `now`.
    pub fn validate_embargo_end_date(
        &self,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ModelResult<()> {
        let policy = &self.config.sanctions;
        let delta = end_date - now;
        if delta > policy.embargo_max {
            return Err(ModelError::value(format!(
                "Registrations can only be embargoed for up to {} days.",
                policy.embargo_max.num_days()
            )));
        }
        if delta < policy.embargo_min {
            return Err(ModelError::value(format!(
                "Embargo end date must be at least {} days in the future.",
                policy.embargo_min.num_days()
            )));
        }
        Ok(())
    }

    /// Withdraw a public or embargoed registration, pending admin approval.
    pub fn retract_registration(
        &mut self,
        registration: &NodeId,
        user: &UserId,
        justification: Option<String>,
    ) -> ModelResult<SanctionId> {
        let node = self.node(registration)?;
        let withdrawable = node.is_registration()
            && (node.is_public
                || self.is_pending_embargo(registration)
                || self.is_embargoed(registration));
        if !withdrawable {
            return Err(ModelError::node_state(
                "Only public or embargoed registrations may be withdrawn",
            ));
        }
        self.root_registration(registration)?;
        self.ensure_admin(registration, user, "Only admins may withdraw a registration")?;
        self.ensure_no_active(registration, SanctionKind::Retraction)?;

        let sanction = Sanction::new(
            registration,
            SanctionDetails::Retraction {
                justification,
                date_retracted: None,
            },
            Some(user),
            None,
        );
        let id = self.open_sanction(sanction)?;
        self.attach_sanction(registration, SanctionKind::Retraction, id)?;
        self.log_sanction_action(&id, LogAction::RetractionInitiated, Some(user))?;
        Ok(id)
    }

    /// Ask the tree's admins to lift an approved embargo early.
    pub fn request_embargo_termination(
        &mut self,
        registration: &NodeId,
        user: &UserId,
    ) -> ModelResult<SanctionId> {
        if !self.is_embargoed(registration) {
            return Err(ModelError::node_state("This node is not under active embargo"));
        }
        if !self.node(registration)?.is_root() {
            return Err(ModelError::node_state(
                "Only the root of an embargoed registration can request termination",
            ));
        }
        self.ensure_admin(registration, user, "Only admins may end an embargo early")?;
        self.ensure_no_active(registration, SanctionKind::EmbargoTerminationApproval)?;
        let embargo = self
            .own_sanction_id(registration, SanctionKind::Embargo)
            .ok_or_else(|| ModelError::node_state("This node is not under active embargo"))?;

        let sanction = Sanction::new(
            registration,
            SanctionDetails::EmbargoTerminationApproval { embargo },
            Some(user),
            None,
        );
        let id = self.open_sanction(sanction)?;
        self.attach_sanction(registration, SanctionKind::EmbargoTerminationApproval, id)?;
        Ok(id)
    }

    /// Lift an approved embargo now: the embargo completes and the whole
    /// registration tree becomes public. Only valid on the tree root.
    pub fn terminate_embargo(
        &mut self,
        registration: &NodeId,
        actor: Option<&UserId>,
    ) -> ModelResult<()> {
        let node = self.node(registration)?;
        if !node.is_registration() || !node.is_root() {
            return Err(ModelError::node_state(
                "Embargoes can only be terminated on the root of a registration",
            ));
        }
        if let Some(user) = actor {
            self.ensure_admin(registration, user, "Only admins may terminate an embargo")?;
        }
        let embargo = self
            .own_sanction_id(registration, SanctionKind::Embargo)
            .filter(|_| self.is_embargoed(registration))
            .ok_or_else(|| {
                ModelError::node_state("No active embargo found for this registration")
            })?;
        self.apply_decision(&embargo, Decision::Terminate)?;
        info!(registration = %registration, embargo = %embargo, "embargo terminated");
        Ok(())
    }

    /// Soft-delete every node of a registration tree. Nodes whose embargo was
    /// placed on an existing registration keep their source link.
    pub fn delete_registration_tree(&mut self, registration: &NodeId) -> ModelResult<()> {
        let now = Utc::now();
        for id in self.node_and_primary_descendants(registration)? {
            let keep_source = self
                .own_sanction_id(&id, SanctionKind::Embargo)
                .and_then(|s| self.sanctions.get(&s))
                .is_some_and(Sanction::for_existing_registration);
            let node = self.node_mut(&id)?;
            node.is_deleted = true;
            node.deleted_date = Some(now);
            if !keep_source {
                if let Some(info) = node.registration_mut() {
                    info.registered_from = None;
                }
            }
        }
        info!(registration = %registration, "registration tree deleted");
        Ok(())
    }

    // ── Status queries ──

    /// The sanction governing `node`: embargo termination, then retraction,
    /// then embargo, then registration approval.
    pub fn sanction_of(&self, node: &NodeId) -> Option<&Sanction> {
        [
            SanctionKind::EmbargoTerminationApproval,
            SanctionKind::Retraction,
            SanctionKind::Embargo,
            SanctionKind::RegistrationApproval,
        ]
        .into_iter()
        .find_map(|kind| self.inherited_sanction(node, kind))
    }

    pub fn is_pending_registration(&self, node: &NodeId) -> bool {
        self.inherited_sanction(node, SanctionKind::RegistrationApproval)
            .is_some_and(|s| s.state.is_pending())
    }

    pub fn is_registration_approved(&self, node: &NodeId) -> bool {
        self.inherited_sanction(node, SanctionKind::RegistrationApproval)
            .is_some_and(|s| s.state == osf_types::SanctionState::Approved)
    }

    pub fn is_pending_embargo(&self, node: &NodeId) -> bool {
        self.inherited_sanction(node, SanctionKind::Embargo)
            .is_some_and(|s| s.state.is_pending())
    }

    pub fn is_pending_embargo_for_existing_registration(&self, node: &NodeId) -> bool {
        self.inherited_sanction(node, SanctionKind::Embargo)
            .is_some_and(|s| s.state.is_pending() && s.for_existing_registration())
    }

    /// An approved embargo is in force and the node is still private.
    pub fn is_embargoed(&self, node: &NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| !n.is_public)
            && self
                .inherited_sanction(node, SanctionKind::Embargo)
                .is_some_and(|s| s.state == osf_types::SanctionState::Approved)
    }

    /// End date of an embargo that is pending or in force.
    pub fn embargo_end_date(&self, node: &NodeId) -> Option<DateTime<Utc>> {
        self.inherited_sanction(node, SanctionKind::Embargo)
            .filter(|s| !s.state.is_terminal())
            .and_then(|s| s.end_date)
    }

    pub fn is_retracted(&self, node: &NodeId) -> bool {
        self.inherited_sanction(node, SanctionKind::Retraction)
            .is_some_and(|s| s.state == osf_types::SanctionState::Approved)
    }

    pub fn is_pending_retraction(&self, node: &NodeId) -> bool {
        self.inherited_sanction(node, SanctionKind::Retraction)
            .is_some_and(|s| s.state.is_pending())
    }

    pub fn is_pending_embargo_termination(&self, node: &NodeId) -> bool {
        self.inherited_sanction(node, SanctionKind::EmbargoTerminationApproval)
            .is_some_and(|s| s.state.is_pending())
    }

    /// Sanction of `kind` on the node, else on the nearest registration
    /// ancestor carrying one.
    pub fn inherited_sanction(&self, node: &NodeId, kind: SanctionKind) -> Option<&Sanction> {
        let mut current = self.nodes.get(node);
        let mut hops = 0;
        while let Some(record) = current {
            record.registration()?;
            if let Some(id) = self.own_sanction_id(&record.id, kind) {
                return self.sanctions.get(&id);
            }
            hops += 1;
            if hops > self.nodes.len() {
                return None;
            }
            current = record.parent.as_ref().and_then(|p| self.nodes.get(p));
        }
        None
    }

    fn own_sanction_id(&self, node: &NodeId, kind: SanctionKind) -> Option<SanctionId> {
        let info = self.nodes.get(node)?.registration()?;
        match kind {
            SanctionKind::RegistrationApproval => info.registration_approval,
            SanctionKind::Embargo => info.embargo,
            SanctionKind::Retraction => info.retraction,
            SanctionKind::EmbargoTerminationApproval => info.embargo_termination_approval,
        }
    }

    fn attach_sanction(
        &mut self,
        registration: &NodeId,
        kind: SanctionKind,
        sanction: SanctionId,
    ) -> ModelResult<()> {
        let info = self
            .node_mut(registration)?
            .registration_mut()
            .ok_or_else(|| ModelError::node_state("Node is not a registration"))?;
        let slot = match kind {
            SanctionKind::RegistrationApproval => &mut info.registration_approval,
            SanctionKind::Embargo => &mut info.embargo,
            SanctionKind::Retraction => &mut info.retraction,
            SanctionKind::EmbargoTerminationApproval => &mut info.embargo_termination_approval,
        };
        *slot = Some(sanction);
        Ok(())
    }

    fn root_registration(&self, registration: &NodeId) -> ModelResult<&Node> {
        let node = self.node(registration)?;
        if !node.is_registration() {
            return Err(ModelError::node_state(format!(
                "Node {} is not a registration",
                registration
            )));
        }
        if !node.is_root() {
            return Err(ModelError::node_state(
                "Sanctions can only be initiated on the root of a registration",
            ));
        }
        if node.is_deleted {
            return Err(ModelError::node_state("Registration has been deleted"));
        }
        Ok(node)
    }

    fn ensure_admin(&self, node: &NodeId, user: &UserId, message: &str) -> ModelResult<()> {
        self.node(node)?;
        if self.has_permission(node, user, Permission::Admin) {
            Ok(())
        } else {
            Err(ModelError::permissions(message))
        }
    }

    fn ensure_no_active(&self, registration: &NodeId, kind: SanctionKind) -> ModelResult<()> {
        let active = self
            .own_sanction_id(registration, kind)
            .and_then(|id| self.sanctions.get(&id))
            .filter(|s| !s.state.is_terminal());
        match active {
            Some(sanction) => Err(ModelError::node_state(format!(
                "Registration {} already has an active {} ({})",
                registration, kind, sanction.state
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use chrono::Duration;
    use osf_types::{NodeCategory, SanctionState};

    fn schema() -> RegistrationSchema {
        RegistrationSchema::new("prereg", "Prereg Challenge", 2)
    }

    fn setup() -> (NodeGraph, UserId, NodeId) {
        let mut graph = NodeGraph::new(ModelConfig::default());
        let user = graph.create_user("Ronald Fisher").unwrap();
        let project = graph
            .create_project(&user, "Tea Tasting", NodeCategory::Project, None)
            .unwrap();
        (graph, user, project)
    }

    fn registered(graph: &mut NodeGraph, user: &UserId, project: &NodeId) -> NodeId {
        graph
            .register_node(project, &schema(), user, json!({ "q1": "a" }), None)
            .unwrap()
    }

    #[test]
    fn test_register_copies_fields_contributors_and_logs() {
        let (mut graph, user, project) = setup();
        graph.add_tag(&project, "lady", &user).unwrap();
        let reg = registered(&mut graph, &user, &project);

        let node = graph.node(&reg).unwrap();
        let info = node.registration().unwrap();
        assert_eq!(info.registered_from.as_ref(), Some(&project));
        assert_eq!(info.registered_meta["prereg"], json!({ "q1": "a" }));
        assert_eq!(info.registered_user.as_ref(), Some(&user));
        assert!(!node.is_public);
        assert!(node.tags.contains("lady"));
        assert_eq!(
            graph.contributors_of(&reg)[0].permissions(),
            graph.contributors_of(&project)[0].permissions()
        );
        // project_created and tag_added cloned; project_registered stays on the source.
        let cloned: Vec<_> = graph.logs_for(&reg).iter().map(|l| l.action).collect();
        assert_eq!(cloned, vec![LogAction::ProjectCreated, LogAction::TagAdded]);
        assert_eq!(
            graph.logs_for(&project).last().unwrap().action,
            LogAction::ProjectRegistered
        );
    }

    #[test]
    fn test_register_refuses_collections_and_outsiders_without_writes() {
        let (mut graph, user, project) = setup();
        let outsider = graph.create_user("Outsider").unwrap();
        let collection = graph.create_collection(&user, "Bookmarks").unwrap();
        let nodes_before = graph.nodes().count();

        assert!(matches!(
            graph.register_node(&collection, &schema(), &user, json!({}), None),
            Err(ModelError::NodeState(_))
        ));
        assert!(matches!(
            graph.register_node(&project, &schema(), &outsider, json!({}), None),
            Err(ModelError::Permissions(_))
        ));
        assert_eq!(graph.nodes().count(), nodes_before);
    }

    #[test]
    fn test_unreadable_child_aborts_before_any_clone() {
        let (mut graph, user, project) = setup();
        let writer = graph.create_user("Writer").unwrap();
        graph
            .add_contributor(&project, &writer, None, true, Some(&user), false)
            .unwrap();
        graph
            .create_project(&user, "Hidden", NodeCategory::Data, Some(&project))
            .unwrap();
        let nodes_before = graph.nodes().count();
        let logs_before = graph.logs.len();

        // Writer can edit the parent but has no role on the child.
        let result = graph.register_node(&project, &schema(), &writer, json!({}), None);
        assert!(matches!(result, Err(ModelError::Permissions(_))));
        assert_eq!(graph.nodes().count(), nodes_before);
        assert_eq!(graph.logs.len(), logs_before);
    }

    #[test]
    fn test_license_is_copied_by_value() {
        let (mut graph, user, project) = setup();
        let license = crate::graph::NodeLicenseRecord {
            license_id: "CC0".into(),
            name: "CC0 1.0".into(),
            year: Some("2016".into()),
            copyright_holders: vec![],
        };
        graph.set_license(&project, license.clone(), &user).unwrap();
        let reg = registered(&mut graph, &user, &project);

        let mut changed = license.clone();
        changed.name = "MIT".into();
        graph.set_license(&project, changed, &user).unwrap();
        assert_eq!(graph.license(&reg).unwrap(), Some(&license));
    }

    #[test]
    fn test_embargo_date_bounds() {
        let (graph, _, _) = setup();
        let now = Utc::now();
        assert!(graph
            .validate_embargo_end_date(now + Duration::days(2), now)
            .is_err());
        assert!(graph
            .validate_embargo_end_date(now + Duration::days(5 * 365), now)
            .is_err());
        assert!(graph
            .validate_embargo_end_date(now + Duration::days(30), now)
            .is_ok());
    }

    #[test]
    fn test_second_active_sanction_of_same_kind_fails() {
        let (mut graph, user, project) = setup();
        let reg = registered(&mut graph, &user, &project);
        graph
            .embargo_registration(&reg, &user, Utc::now() + Duration::days(30), false)
            .unwrap();
        let sanctions_before = graph.sanctions().count();

        let again = graph.embargo_registration(&reg, &user, Utc::now() + Duration::days(60), false);
        assert!(matches!(again, Err(ModelError::NodeState(_))));
        assert_eq!(graph.sanctions().count(), sanctions_before);
    }

    #[test]
    fn test_embargo_rejected_by_admin_deletes_new_registration() {
        let (mut graph, user, project) = setup();
        let reg = registered(&mut graph, &user, &project);
        let embargo = graph
            .embargo_registration(&reg, &user, Utc::now() + Duration::days(30), false)
            .unwrap();
        let token = graph
            .sanction(&embargo)
            .unwrap()
            .rejection_token(&user)
            .unwrap()
            .to_string();

        let state = graph.reject_sanction(&embargo, &user, &token).unwrap();
        assert_eq!(state, SanctionState::Rejected);
        let node = graph.node(&reg).unwrap();
        assert!(node.is_deleted);
        assert_eq!(node.registered_from(), None);
        assert_eq!(
            graph.logs_for(&project).last().unwrap().action,
            LogAction::EmbargoCancelled
        );
    }

    #[test]
    fn test_child_registration_inherits_root_sanction() {
        let (mut graph, user, project) = setup();
        graph
            .create_project(&user, "Child", NodeCategory::Data, Some(&project))
            .unwrap();
        let reg = registered(&mut graph, &user, &project);
        let child_reg = graph.nodes_primary(&reg)[0].clone();
        graph.require_approval(&reg, &user).unwrap();

        assert!(graph.is_pending_registration(&child_reg));
        assert_eq!(
            graph.sanction_of(&child_reg).map(Sanction::kind),
            Some(SanctionKind::RegistrationApproval)
        );
        assert!(matches!(
            graph.require_approval(&child_reg, &user),
            Err(ModelError::NodeState(_))
        ));
    }

    #[test]
    fn test_retraction_requires_public_or_embargoed() {
        let (mut graph, user, project) = setup();
        let reg = registered(&mut graph, &user, &project);
        assert!(matches!(
            graph.retract_registration(&reg, &user, None),
            Err(ModelError::NodeState(_))
        ));
    }

    #[test]
    fn test_terminate_requires_approved_embargo() {
        let (mut graph, user, project) = setup();
        let reg = registered(&mut graph, &user, &project);
        assert!(matches!(
            graph.terminate_embargo(&reg, Some(&user)),
            Err(ModelError::NodeState(_))
        ));
        graph
            .embargo_registration(&reg, &user, Utc::now() + Duration::days(30), false)
            .unwrap();
        // Still pending.
        assert!(graph.terminate_embargo(&reg, None).is_err());
    }

    #[test]
    fn test_public_registration_is_not_embargoed() {
        let (mut graph, user, project) = setup();
        let reg = registered(&mut graph, &user, &project);
        let embargo = graph
            .embargo_registration(&reg, &user, Utc::now() + Duration::days(30), false)
            .unwrap();
        let token = graph
            .sanction(&embargo)
            .unwrap()
            .approval_token(&user)
            .unwrap()
            .to_string();
        graph.approve_sanction(&embargo, &user, &token).unwrap();
        assert!(graph.is_embargoed(&reg));

        graph.node_mut(&reg).unwrap().is_public = true;
        assert_eq!(graph.sanction(&embargo).unwrap().state, SanctionState::Approved);
        assert!(!graph.is_embargoed(&reg));
    }
}
