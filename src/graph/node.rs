//! Node records and node-level mutations
//!
//! A node is a project, component, collection or registration. All kinds share
//! one record shape; registration-only data hangs off `NodeKind::Registration`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use osf_types::{LogAction, NodeCategory, NodeId, Permission, SanctionId, UserId};

use super::NodeGraph;
use crate::contributor::Contributor;
use crate::error::{ModelError, ModelResult, ValidationError};
use crate::events::ModelEvent;
use crate::nodelog::NewLog;

pub const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: NodeCategory,
    pub kind: NodeKind,
    pub is_public: bool,
    pub is_deleted: bool,
    pub deleted_date: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub parent: Option<NodeId>,
    /// Top-most ancestor. Recomputed on every save.
    pub root: NodeId,
    pub creator: Option<UserId>,
    pub forked_from: Option<NodeId>,
    pub template_node: Option<NodeId>,
    pub node_license: Option<NodeLicenseRecord>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub affiliated_institutions: Vec<String>,
}

/// Single-table subtype tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Project,
    Collection,
    Registration(Box<RegistrationInfo>),
}

/// Fields carried only by registrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub registered_date: DateTime<Utc>,
    pub registered_user: Option<UserId>,
    pub registered_schema: Vec<RegistrationSchema>,
    /// Answers keyed by schema id.
    pub registered_meta: BTreeMap<String, serde_json::Value>,
    /// Live node this registration was cloned from.
    pub registered_from: Option<NodeId>,
    pub registration_approval: Option<SanctionId>,
    pub embargo: Option<SanctionId>,
    pub retraction: Option<SanctionId>,
    pub embargo_termination_approval: Option<SanctionId>,
}

/// Metadata template a registration was filed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSchema {
    pub id: String,
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub requires_approval: bool,
}

impl RegistrationSchema {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version,
            requires_approval: false,
        }
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

/// License attached to a node. Registrations hold their own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLicenseRecord {
    pub license_id: String,
    pub name: String,
    pub year: Option<String>,
    #[serde(default)]
    pub copyright_holders: Vec<String>,
}

impl Node {
    fn new(id: NodeId, title: String, category: NodeCategory, kind: NodeKind) -> Self {
        let now = Utc::now();
        Self {
            root: id.clone(),
            id,
            title,
            description: String::new(),
            category,
            kind,
            is_public: false,
            is_deleted: false,
            deleted_date: None,
            date_created: now,
            date_modified: now,
            parent: None,
            creator: None,
            forked_from: None,
            template_node: None,
            node_license: None,
            tags: BTreeSet::new(),
            affiliated_institutions: Vec::new(),
        }
    }

    pub fn is_registration(&self) -> bool {
        matches!(self.kind, NodeKind::Registration(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, NodeKind::Collection)
    }

    pub fn is_root(&self) -> bool {
        self.root == self.id
    }

    pub fn registration(&self) -> Option<&RegistrationInfo> {
        match &self.kind {
            NodeKind::Registration(info) => Some(info),
            _ => None,
        }
    }

    pub(crate) fn registration_mut(&mut self) -> Option<&mut RegistrationInfo> {
        match &mut self.kind {
            NodeKind::Registration(info) => Some(info),
            _ => None,
        }
    }

    pub fn registered_from(&self) -> Option<&NodeId> {
        self.registration().and_then(|r| r.registered_from.as_ref())
    }
}

pub(crate) fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::BlankField { field: "title" });
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "title",
            max: MAX_TITLE_LENGTH,
        });
    }
    Ok(title.to_string())
}

impl NodeGraph {
    /// Create a project, or a component when `parent` is given.
    ///
    /// The creator becomes a visible admin contributor and a
    /// `project_created` log is written at the creation timestamp.
    pub fn create_project(
        &mut self,
        creator: &UserId,
        title: &str,
        category: NodeCategory,
        parent: Option<&NodeId>,
    ) -> ModelResult<NodeId> {
        let title = validate_title(title)?;
        self.user(creator)?;
        if let Some(parent_id) = parent {
            let parent_node = self.node(parent_id)?;
            if parent_node.is_deleted {
                return Err(ModelError::node_state("Cannot add a component to a deleted node"));
            }
            if parent_node.is_registration() || parent_node.is_collection() {
                return Err(ModelError::node_state(
                    "Components can only be added to projects",
                ));
            }
            if !self.can_edit(parent_id, creator) {
                return Err(ModelError::permissions(format!(
                    "User {} cannot add components to {}",
                    creator, parent_id
                )));
            }
        }

        let id = self.allocate_guid();
        let mut node = Node::new(id.clone(), title, category, NodeKind::Project);
        node.creator = Some(creator.clone());
        node.parent = parent.cloned();
        let date_created = node.date_created;
        self.nodes.insert(id.clone(), node);
        if let Some(parent_id) = parent {
            self.children
                .entry(parent_id.clone())
                .or_default()
                .push(id.clone());
        }
        self.save(&id)?;

        self.contributors
            .entry(id.clone())
            .or_default()
            .push(Contributor::new(&id, creator, Permission::Admin, true));

        let mut params = json!({ "node": id });
        if let Some(parent_id) = parent {
            params["parent_node"] = json!(parent_id);
        }
        self.add_log(
            &id,
            NewLog::new(LogAction::ProjectCreated)
                .params(params)
                .user(creator)
                .at(date_created),
        )?;
        self.emit(ModelEvent::ProjectCreated { node: id.clone() });
        info!(node = %id, creator = %creator, parent = ?parent, "project created");
        Ok(id)
    }

    /// Create a collection. Collections group nodes and are never registered.
    pub fn create_collection(&mut self, user: &UserId, title: &str) -> ModelResult<NodeId> {
        let title = validate_title(title)?;
        self.user(user)?;
        let id = self.allocate_guid();
        let mut node = Node::new(id.clone(), title, NodeCategory::Uncategorized, NodeKind::Collection);
        node.creator = Some(user.clone());
        self.nodes.insert(id.clone(), node);
        self.contributors
            .entry(id.clone())
            .or_default()
            .push(Contributor::new(&id, user, Permission::Admin, true));
        debug!(collection = %id, "collection created");
        Ok(id)
    }

    /// Add a non-owning pointer from `owner` to `target`.
    pub fn add_node_link(
        &mut self,
        owner: &NodeId,
        target: &NodeId,
        user: &UserId,
    ) -> ModelResult<()> {
        if owner == target {
            return Err(ModelError::value("A node cannot link to itself"));
        }
        let target_title = self.node(target)?.title.clone();
        let owner_node = self.node(owner)?;
        if owner_node.is_registration() {
            return Err(ModelError::node_state("Registrations are immutable"));
        }
        let parent_id = owner_node.parent.clone();
        if !self.can_edit(owner, user) {
            return Err(ModelError::permissions("Must have write access to add links"));
        }
        let links = self.node_links.entry(owner.clone()).or_default();
        if links.contains(target) {
            return Err(ModelError::value(format!(
                "Pointer to node {} already in list",
                target
            )));
        }
        links.push(target.clone());
        self.add_log(
            owner,
            NewLog::new(LogAction::PointerCreated)
                .params(json!({
                    "parent_node": parent_id,
                    "node": owner,
                    "pointer": { "id": target, "title": target_title },
                }))
                .user(user),
        )?;
        Ok(())
    }

    pub fn remove_node_link(
        &mut self,
        owner: &NodeId,
        target: &NodeId,
        user: &UserId,
    ) -> ModelResult<()> {
        if !self.can_edit(owner, user) {
            return Err(ModelError::permissions("Must have write access to remove links"));
        }
        let links = self.node_links.entry(owner.clone()).or_default();
        let before = links.len();
        links.retain(|t| t != target);
        if links.len() == before {
            return Err(ModelError::not_found("pointer", target));
        }
        self.add_log(
            owner,
            NewLog::new(LogAction::PointerRemoved)
                .params(json!({ "node": owner, "pointer": { "id": target } }))
                .user(user),
        )?;
        Ok(())
    }

    /// Mark a project or component deleted. Children must be deleted first.
    pub fn soft_delete(&mut self, node_id: &NodeId, user: &UserId) -> ModelResult<()> {
        let node = self.node(node_id)?;
        if node.is_registration() {
            return Err(ModelError::node_state(
                "Registrations are removed through their sanction workflow",
            ));
        }
        if node.is_deleted {
            return Ok(());
        }
        if !self.has_permission(node_id, user, Permission::Admin) {
            return Err(ModelError::permissions("Must be an admin to delete a node"));
        }
        let live_children = self
            .nodes_primary(node_id)
            .iter()
            .any(|c| self.nodes.get(c).is_some_and(|n| !n.is_deleted));
        if live_children {
            return Err(ModelError::node_state(
                "Any child components must be deleted prior to deleting this project",
            ));
        }

        let parent = node.parent.clone();
        let action = if parent.is_some() {
            LogAction::NodeRemoved
        } else {
            LogAction::ProjectDeleted
        };
        let now = Utc::now();
        let node = self.node_mut(node_id)?;
        node.is_deleted = true;
        node.deleted_date = Some(now);
        self.add_log(
            node_id,
            NewLog::new(action)
                .params(json!({ "project": parent, "node": node_id }))
                .user(user)
                .at(now),
        )?;
        info!(node = %node_id, "node deleted");
        Ok(())
    }

    pub fn set_title(&mut self, node_id: &NodeId, title: &str, user: &UserId) -> ModelResult<()> {
        let title = validate_title(title)?;
        self.ensure_mutable(node_id)?;
        if !self.can_edit(node_id, user) {
            return Err(ModelError::permissions("Must have write access to edit the title"));
        }
        let node = self.node_mut(node_id)?;
        let original = std::mem::replace(&mut node.title, title.clone());
        let parent = node.parent.clone();
        self.add_log(
            node_id,
            NewLog::new(LogAction::EditedTitle)
                .params(json!({
                    "parent_node": parent,
                    "node": node_id,
                    "title_original": original,
                    "title_new": title,
                }))
                .user(user),
        )?;
        Ok(())
    }

    pub fn add_tag(&mut self, node_id: &NodeId, tag: &str, user: &UserId) -> ModelResult<bool> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ValidationError::BlankField { field: "tag" }.into());
        }
        self.ensure_mutable(node_id)?;
        if !self.can_edit(node_id, user) {
            return Err(ModelError::permissions("Must have write access to add tags"));
        }
        let node = self.node_mut(node_id)?;
        if !node.tags.insert(tag.to_string()) {
            return Ok(false);
        }
        let parent = node.parent.clone();
        self.add_log(
            node_id,
            NewLog::new(LogAction::TagAdded)
                .params(json!({ "parent_node": parent, "node": node_id, "tag": tag }))
                .user(user),
        )?;
        Ok(true)
    }

    /// Affiliate a node with an institution the acting user belongs to.
    pub fn add_affiliated_institution(
        &mut self,
        node_id: &NodeId,
        institution: &str,
        user: &UserId,
    ) -> ModelResult<()> {
        let inst = self.institution(institution)?.clone();
        if !self.user(user)?.affiliated_institutions.contains(institution) {
            return Err(ModelError::UserNotAffiliated {
                institution: inst.name,
            });
        }
        self.ensure_mutable(node_id)?;
        if !self.can_edit(node_id, user) {
            return Err(ModelError::permissions(
                "Must have write access to change affiliations",
            ));
        }
        let node = self.node_mut(node_id)?;
        if node.affiliated_institutions.contains(&inst.id) {
            return Ok(());
        }
        node.affiliated_institutions.push(inst.id.clone());
        self.add_log(
            node_id,
            NewLog::new(LogAction::AffiliatedInstitutionAdded)
                .params(json!({
                    "node": node_id,
                    "institution": { "id": inst.id, "name": inst.name },
                }))
                .user(user),
        )?;
        Ok(())
    }

    pub fn set_license(
        &mut self,
        node_id: &NodeId,
        license: NodeLicenseRecord,
        user: &UserId,
    ) -> ModelResult<()> {
        self.ensure_mutable(node_id)?;
        if !self.has_permission(node_id, user, Permission::Admin) {
            return Err(ModelError::permissions("Must be an admin to change the license"));
        }
        let params = json!({ "node": node_id, "new_license": license.name });
        self.node_mut(node_id)?.node_license = Some(license);
        self.add_log(
            node_id,
            NewLog::new(LogAction::ChangedLicense).params(params).user(user),
        )?;
        Ok(())
    }

    /// The node's license, falling back to the nearest ancestor's.
    pub fn license(&self, node_id: &NodeId) -> ModelResult<Option<&NodeLicenseRecord>> {
        let mut current = self.node(node_id)?;
        loop {
            if let Some(license) = &current.node_license {
                return Ok(Some(license));
            }
            match &current.parent {
                Some(parent) => current = self.node(parent)?,
                None => return Ok(None),
            }
        }
    }

    fn ensure_mutable(&self, node_id: &NodeId) -> ModelResult<()> {
        let node = self.node(node_id)?;
        if node.is_registration() {
            return Err(ModelError::node_state("Registrations are immutable"));
        }
        if node.is_deleted {
            return Err(ModelError::node_state("Cannot modify a deleted node"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    fn graph_with_user() -> (NodeGraph, UserId) {
        let mut graph = NodeGraph::new(ModelConfig::default());
        let user = graph.create_user("Rosalind Franklin").unwrap();
        (graph, user)
    }

    #[test]
    fn test_create_project_adds_creator_and_log() {
        let (mut graph, user) = graph_with_user();
        let node = graph
            .create_project(&user, "  Photo 51 ", NodeCategory::Data, None)
            .unwrap();

        let record = graph.node(&node).unwrap();
        assert_eq!(record.title, "Photo 51");
        assert!(record.is_root());
        assert!(!record.is_public);

        let contribs = graph.contributors_of(&node);
        assert_eq!(contribs.len(), 1);
        assert!(contribs[0].admin && contribs[0].write && contribs[0].read && contribs[0].visible);

        let logs = graph.logs_for(&node);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, LogAction::ProjectCreated);
        assert_eq!(logs[0].date, record.date_created);
    }

    #[test]
    fn test_component_requires_write_on_parent() {
        let (mut graph, owner) = graph_with_user();
        let stranger = graph.create_user("Stranger").unwrap();
        let project = graph
            .create_project(&owner, "Parent", NodeCategory::Project, None)
            .unwrap();

        let err = graph
            .create_project(&stranger, "Child", NodeCategory::Data, Some(&project))
            .unwrap_err();
        assert!(matches!(err, ModelError::Permissions(_)));

        let child = graph
            .create_project(&owner, "Child", NodeCategory::Data, Some(&project))
            .unwrap();
        assert_eq!(graph.node(&child).unwrap().root, project);
        let log = &graph.logs_for(&child)[0];
        assert_eq!(log.params["parent_node"], json!(project));
    }

    #[test]
    fn test_title_validation() {
        let (mut graph, user) = graph_with_user();
        assert!(graph
            .create_project(&user, "", NodeCategory::Project, None)
            .is_err());
        let long = "x".repeat(MAX_TITLE_LENGTH + 1);
        let err = graph
            .create_project(&user, &long, NodeCategory::Project, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::Validation(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_soft_delete_requires_children_deleted_first() {
        let (mut graph, user) = graph_with_user();
        let project = graph
            .create_project(&user, "Parent", NodeCategory::Project, None)
            .unwrap();
        let child = graph
            .create_project(&user, "Child", NodeCategory::Data, Some(&project))
            .unwrap();

        assert!(matches!(
            graph.soft_delete(&project, &user),
            Err(ModelError::NodeState(_))
        ));
        graph.soft_delete(&child, &user).unwrap();
        graph.soft_delete(&project, &user).unwrap();
        assert!(graph.node(&project).unwrap().is_deleted);
        assert_eq!(
            graph.logs_for(&child).last().unwrap().action,
            LogAction::NodeRemoved
        );
    }

    #[test]
    fn test_node_links_are_not_children() {
        let (mut graph, user) = graph_with_user();
        let a = graph
            .create_project(&user, "A", NodeCategory::Project, None)
            .unwrap();
        let b = graph
            .create_project(&user, "B", NodeCategory::Project, None)
            .unwrap();
        graph.add_node_link(&a, &b, &user).unwrap();

        assert!(graph.nodes_primary(&a).is_empty());
        assert_eq!(graph.nodes_pointer(&a), vec![b.clone()]);
        assert!(graph.add_node_link(&a, &b, &user).is_err());
        assert!(graph.has_node_links_recursive(&a).unwrap());
        graph.remove_node_link(&a, &b, &user).unwrap();
        assert!(!graph.has_node_links_recursive(&a).unwrap());
    }

    #[test]
    fn test_affiliation_requires_user_membership() {
        let (mut graph, user) = graph_with_user();
        graph.create_institution("kcl", "King's College London").unwrap();
        let node = graph
            .create_project(&user, "Fibres", NodeCategory::Data, None)
            .unwrap();

        let err = graph
            .add_affiliated_institution(&node, "kcl", &user)
            .unwrap_err();
        assert!(matches!(err, ModelError::UserNotAffiliated { .. }));

        graph.affiliate_user(&user, "kcl").unwrap();
        graph.add_affiliated_institution(&node, "kcl", &user).unwrap();
        assert_eq!(graph.node(&node).unwrap().affiliated_institutions, vec!["kcl"]);
        assert_eq!(
            graph.logs_for(&node).last().unwrap().action,
            LogAction::AffiliatedInstitutionAdded
        );
    }

    #[test]
    fn test_license_inherits_from_parent() {
        let (mut graph, user) = graph_with_user();
        let project = graph
            .create_project(&user, "Parent", NodeCategory::Project, None)
            .unwrap();
        let child = graph
            .create_project(&user, "Child", NodeCategory::Data, Some(&project))
            .unwrap();
        assert!(graph.license(&child).unwrap().is_none());

        let license = NodeLicenseRecord {
            license_id: "CC-BY-4.0".into(),
            name: "CC-By Attribution 4.0 International".into(),
            year: Some("2016".into()),
            copyright_holders: vec!["Franklin".into()],
        };
        graph.set_license(&project, license.clone(), &user).unwrap();
        assert_eq!(graph.license(&child).unwrap(), Some(&license));
    }

    #[test]
    fn test_add_tag_is_idempotent() {
        let (mut graph, user) = graph_with_user();
        let node = graph
            .create_project(&user, "Tagged", NodeCategory::Project, None)
            .unwrap();
        assert!(graph.add_tag(&node, "dna", &user).unwrap());
        assert!(!graph.add_tag(&node, "dna", &user).unwrap());
        assert_eq!(graph.logs_for(&node).len(), 2);
    }
}
