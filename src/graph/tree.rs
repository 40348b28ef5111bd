//! Tree traversal and the root invariant
//!
//! `root` is denormalised onto every node and recomputed by `save`, which also
//! refreshes every primary descendant so a moved subtree never carries a stale
//! root.

use chrono::Utc;
use std::collections::HashSet;

use osf_types::NodeId;

use super::{Auth, NodeGraph};
use crate::error::{ModelError, ModelResult};

impl NodeGraph {
    /// Recompute `root` for the node and its primary descendants and bump
    /// `date_modified`.
    pub fn save(&mut self, node_id: &NodeId) -> ModelResult<()> {
        let root = self.compute_root(node_id)?;
        let descendants = self.primary_descendants(node_id)?;
        let node = self.node_mut(node_id)?;
        node.root = root.clone();
        node.date_modified = Utc::now();
        for descendant in descendants {
            self.node_mut(&descendant)?.root = root.clone();
        }
        Ok(())
    }

    /// Walk parent links to the top.
    pub fn compute_root(&self, node_id: &NodeId) -> ModelResult<NodeId> {
        let mut seen = HashSet::new();
        let mut current = self.node(node_id)?;
        while let Some(parent) = &current.parent {
            if !seen.insert(current.id.clone()) {
                return Err(ModelError::node_state(format!(
                    "Cycle detected above node {}",
                    node_id
                )));
            }
            current = self.node(parent)?;
        }
        Ok(current.id.clone())
    }

    /// Re-parent a project or component. Refuses moves that would create a cycle.
    pub fn move_node(&mut self, node_id: &NodeId, new_parent: Option<&NodeId>) -> ModelResult<()> {
        if self.node(node_id)?.is_registration() {
            return Err(ModelError::node_state("Registrations are immutable"));
        }
        if let Some(parent) = new_parent {
            if parent == node_id || self.ancestors(parent)?.contains(node_id) {
                return Err(ModelError::node_state(
                    "A node cannot be moved beneath itself",
                ));
            }
            if self.node(parent)?.is_registration() {
                return Err(ModelError::node_state("Registrations are immutable"));
            }
        }

        let old_parent = self.node(node_id)?.parent.clone();
        if let Some(old) = old_parent {
            if let Some(siblings) = self.children.get_mut(&old) {
                siblings.retain(|c| c != node_id);
            }
        }
        if let Some(parent) = new_parent {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(node_id.clone());
        }
        self.node_mut(node_id)?.parent = new_parent.cloned();
        self.save(node_id)
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, node_id: &NodeId) -> ModelResult<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut current = self.node(node_id)?;
        while let Some(parent) = &current.parent {
            if out.contains(parent) {
                break;
            }
            out.push(parent.clone());
            current = self.node(parent)?;
        }
        Ok(out)
    }

    /// Direct primary children, in creation order.
    pub fn nodes_primary(&self, node_id: &NodeId) -> Vec<NodeId> {
        self.children.get(node_id).cloned().unwrap_or_default()
    }

    /// Direct node-link targets.
    pub fn nodes_pointer(&self, node_id: &NodeId) -> Vec<NodeId> {
        self.node_links.get(node_id).cloned().unwrap_or_default()
    }

    /// Every primary descendant, depth-first, parents before children.
    pub fn primary_descendants(&self, node_id: &NodeId) -> ModelResult<Vec<NodeId>> {
        self.node(node_id)?;
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes_primary(node_id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            stack.extend(self.nodes_primary(&next).into_iter().rev());
            out.push(next);
        }
        Ok(out)
    }

    /// The node followed by its primary descendants.
    pub fn node_and_primary_descendants(&self, node_id: &NodeId) -> ModelResult<Vec<NodeId>> {
        let mut out = vec![node_id.clone()];
        out.extend(self.primary_descendants(node_id)?);
        Ok(out)
    }

    /// Descendants including node-link targets. Links are yielded but never
    /// descended into.
    pub fn descendants_recursive(&self, node_id: &NodeId) -> ModelResult<Vec<NodeId>> {
        let mut out = Vec::new();
        for primary in self.node_and_primary_descendants(node_id)? {
            if &primary != node_id {
                out.push(primary.clone());
            }
            out.extend(self.nodes_pointer(&primary));
        }
        Ok(out)
    }

    pub fn has_node_links_recursive(&self, node_id: &NodeId) -> ModelResult<bool> {
        Ok(self
            .node_and_primary_descendants(node_id)?
            .iter()
            .any(|n| !self.nodes_pointer(n).is_empty()))
    }

    /// First ancestor the requester may view.
    pub fn find_readable_antecedent(
        &self,
        node_id: &NodeId,
        auth: &Auth,
    ) -> ModelResult<Option<NodeId>> {
        for ancestor in self.ancestors(node_id)? {
            if self.can_view(&ancestor, auth)? {
                return Ok(Some(ancestor));
            }
        }
        Ok(None)
    }
}
