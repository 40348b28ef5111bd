//! Node Graph
//!
//! Arena holding every model record, keyed by stable identifier. Nodes never
//! own each other: parent/child structure lives in the `children` index keyed
//! by parent id, and node-links live in a separate `node_links` index, so a
//! node can be both somebody's child and the target of any number of links.
//!
//! Operations are grouped by concern in sibling modules (`node`, `user`,
//! `tree`, and at crate level `contributor`, `privacy`, `nodelog`,
//! `registration`, `sanction`, `draft`), all as `impl NodeGraph` blocks.

pub mod node;
pub mod tree;
pub mod user;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use osf_types::{Guid, NodeId, SanctionId, UserId};

use crate::config::ModelConfig;
use crate::contributor::Contributor;
use crate::draft::DraftRegistration;
use crate::error::{ModelError, ModelResult};
use crate::events::ModelEvent;
use crate::identity::GuidRegistry;
use crate::nodelog::NodeLog;
use crate::privacy::PrivateLink;
use crate::sanction::Sanction;

pub use node::{Node, NodeKind, NodeLicenseRecord, RegistrationInfo, RegistrationSchema};
pub use user::{Auth, Institution, User};

/// In-memory store of nodes, users, contributors, logs and sanctions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeGraph {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    /// Primary children by parent id, in creation order.
    pub(crate) children: BTreeMap<NodeId, Vec<NodeId>>,
    /// Pointer targets by owning node id.
    pub(crate) node_links: BTreeMap<NodeId, Vec<NodeId>>,
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) institutions: BTreeMap<String, Institution>,
    /// Contributor records per node, in the order they were added.
    pub(crate) contributors: BTreeMap<NodeId, Vec<Contributor>>,
    /// Append-only.
    pub(crate) logs: Vec<NodeLog>,
    pub(crate) sanctions: BTreeMap<SanctionId, Sanction>,
    pub(crate) private_links: Vec<PrivateLink>,
    pub(crate) drafts: BTreeMap<Uuid, DraftRegistration>,
    pub(crate) identity: GuidRegistry,
    #[serde(skip)]
    pub(crate) config: ModelConfig,
    /// Events raised by the current operation, dispatched after commit.
    #[serde(skip)]
    pub(crate) pending_events: Vec<ModelEvent>,
}

/// Anything a guid or object id can resolve to.
#[derive(Debug, Clone, Copy)]
pub enum Referent<'a> {
    Node(&'a Node),
    User(&'a User),
    Log(&'a NodeLog),
    Sanction(&'a Sanction),
    Draft(&'a DraftRegistration),
}

impl NodeGraph {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Replace the configuration, e.g. after loading a snapshot.
    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn identity(&self) -> &GuidRegistry {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut GuidRegistry {
        &mut self.identity
    }

    pub(crate) fn allocate_guid(&mut self) -> Guid {
        let length = self.config.guid_length;
        self.identity.allocate(length)
    }

    pub(crate) fn emit(&mut self, event: ModelEvent) {
        self.pending_events.push(event);
    }

    /// Drain events raised since the last call.
    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ── Lookup ──

    pub fn node(&self, id: &NodeId) -> ModelResult<&Node> {
        self.nodes.get(id).ok_or_else(|| ModelError::not_found("node", id))
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> ModelResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::not_found("node", id))
    }

    pub fn user(&self, id: &UserId) -> ModelResult<&User> {
        self.users.get(id).ok_or_else(|| ModelError::not_found("user", id))
    }

    pub fn sanction(&self, id: &SanctionId) -> ModelResult<&Sanction> {
        self.sanctions
            .get(id)
            .ok_or_else(|| ModelError::not_found("sanction", id))
    }

    pub(crate) fn sanction_mut(&mut self, id: &SanctionId) -> ModelResult<&mut Sanction> {
        self.sanctions
            .get_mut(id)
            .ok_or_else(|| ModelError::not_found("sanction", id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn sanctions(&self) -> impl Iterator<Item = &Sanction> {
        self.sanctions.values()
    }

    /// Exactly one node matching `predicate`.
    pub fn find_one_node<F>(&self, query: &str, predicate: F) -> ModelResult<&Node>
    where
        F: Fn(&Node) -> bool,
    {
        let mut matches = self.nodes.values().filter(|n| predicate(n));
        let first = matches.next().ok_or_else(|| ModelError::NotFound {
            kind: "node",
            id: query.to_string(),
        })?;
        if matches.next().is_some() {
            return Err(ModelError::MultipleResults {
                kind: "node",
                query: query.to_string(),
            });
        }
        Ok(first)
    }

    /// Resolve a guid (nodes, users) or object id (logs, sanctions, drafts).
    pub fn resolve(&self, id: &str) -> ModelResult<Referent<'_>> {
        if let Ok(object_id) = Uuid::parse_str(id) {
            if let Some(log) = self.logs.iter().find(|l| l.id == object_id) {
                return Ok(Referent::Log(log));
            }
            if let Some(sanction) = self.sanctions.get(&object_id) {
                return Ok(Referent::Sanction(sanction));
            }
            if let Some(draft) = self.drafts.get(&object_id) {
                return Ok(Referent::Draft(draft));
            }
            return Err(ModelError::not_found("object", id));
        }
        let guid = Guid::new_unchecked(id);
        if let Some(node) = self.nodes.get(&guid) {
            return Ok(Referent::Node(node));
        }
        if let Some(user) = self.users.get(&guid) {
            return Ok(Referent::User(user));
        }
        Err(ModelError::not_found("guid", id))
    }
}
