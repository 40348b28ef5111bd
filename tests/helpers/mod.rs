//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use osf_models::{ModelConfig, NodeGraph, RegistrationSchema};
use osf_types::{NodeCategory, NodeId, Permission, SanctionId, SanctionState, UserId};
use serde_json::json;

pub fn schema() -> RegistrationSchema {
    RegistrationSchema::new("S", "Open-Ended Registration", 2)
}

/// A graph with one user owning one top-level project.
pub struct Fixture {
    pub graph: NodeGraph,
    pub owner: UserId,
    pub project: NodeId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Self {
        let mut graph = NodeGraph::new(config);
        let owner = graph.create_user("Project Owner").unwrap();
        let project = graph
            .create_project(&owner, "Project", NodeCategory::Project, None)
            .unwrap();
        Self {
            graph,
            owner,
            project,
        }
    }

    pub fn component(&mut self, parent: &NodeId, title: &str) -> NodeId {
        self.graph
            .create_project(&self.owner, title, NodeCategory::Data, Some(parent))
            .unwrap()
    }

    /// Add a new user as admin on `node`.
    pub fn admin_on(&mut self, node: &NodeId, name: &str) -> UserId {
        let user = self.graph.create_user(name).unwrap();
        self.graph
            .add_contributor(
                node,
                &user,
                Some(&[Permission::Admin]),
                true,
                Some(&self.owner),
                true,
            )
            .unwrap();
        user
    }

    pub fn register(&mut self) -> NodeId {
        let project = self.project.clone();
        let owner = self.owner.clone();
        self.graph
            .register_node(&project, &schema(), &owner, json!({ "q1": "a" }), None)
            .unwrap()
    }
}

/// Approve `sanction` as `user` with the user's own token.
pub fn approve(graph: &mut NodeGraph, sanction: &SanctionId, user: &UserId) -> SanctionState {
    let token = graph
        .sanction(sanction)
        .unwrap()
        .approval_token(user)
        .unwrap()
        .to_string();
    graph.approve_sanction(sanction, user, &token).unwrap()
}

pub fn reject(graph: &mut NodeGraph, sanction: &SanctionId, user: &UserId) -> SanctionState {
    let token = graph
        .sanction(sanction)
        .unwrap()
        .rejection_token(user)
        .unwrap()
        .to_string();
    graph.reject_sanction(sanction, user, &token).unwrap()
}

/// Approve as every authorizer in ledger order.
pub fn approve_all(graph: &mut NodeGraph, sanction: &SanctionId) -> SanctionState {
    let users: Vec<UserId> = graph
        .sanction(sanction)
        .unwrap()
        .ledger
        .iter()
        .map(|a| a.user.clone())
        .collect();
    let mut state = graph.sanction(sanction).unwrap().state;
    for user in users {
        state = approve(graph, sanction, &user);
    }
    state
}
