//! Contributors and permission resolution
//!
//! A contributor joins a user to a node with three independent flags (read,
//! write, admin) plus visibility. Every node keeps at least one admin and at
//! least one visible contributor: operations that would break either check
//! the invariant before touching any record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use osf_types::{LogAction, NodeId, Permission, UserId};

use crate::error::{ModelError, ModelResult};
use crate::events::ModelEvent;
use crate::graph::{Auth, NodeGraph};
use crate::nodelog::NewLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub node: NodeId,
    pub user: UserId,
    pub read: bool,
    pub write: bool,
    pub admin: bool,
    /// Listed as a bibliographic contributor.
    pub visible: bool,
    pub date_added: DateTime<Utc>,
}

impl Contributor {
    /// Contributor holding `level` and everything it implies.
    pub fn new(node: &NodeId, user: &UserId, level: Permission, visible: bool) -> Self {
        let mut contributor = Self {
            node: node.clone(),
            user: user.clone(),
            read: false,
            write: false,
            admin: false,
            visible,
            date_added: Utc::now(),
        };
        contributor.apply(level.expand());
        contributor
    }

    pub fn has(&self, permission: Permission) -> bool {
        match permission {
            Permission::Read => self.read,
            Permission::Write => self.write,
            Permission::Admin => self.admin,
        }
    }

    /// Set exactly the listed flags.
    fn apply(&mut self, permissions: &[Permission]) {
        self.read = permissions.contains(&Permission::Read);
        self.write = permissions.contains(&Permission::Write);
        self.admin = permissions.contains(&Permission::Admin);
    }

    pub fn permissions(&self) -> Vec<Permission> {
        [Permission::Read, Permission::Write, Permission::Admin]
            .into_iter()
            .filter(|p| self.has(*p))
            .collect()
    }
}

/// One entry of a batch contributor addition.
#[derive(Debug, Clone)]
pub struct ContributorSpec {
    pub user: UserId,
    pub permissions: Vec<Permission>,
    pub visible: bool,
}

impl NodeGraph {
    pub fn contributors_of(&self, node: &NodeId) -> &[Contributor] {
        self.contributors.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contributor(&self, node: &NodeId, user: &UserId) -> Option<&Contributor> {
        self.contributors_of(node).iter().find(|c| &c.user == user)
    }

    fn contributor_mut(&mut self, node: &NodeId, user: &UserId) -> ModelResult<&mut Contributor> {
        self.contributors
            .get_mut(node)
            .and_then(|list| list.iter_mut().find(|c| &c.user == user))
            .ok_or_else(|| {
                ModelError::value(format!("User {} not in contributors of {}", user, node))
            })
    }

    pub fn is_contributor(&self, node: &NodeId, user: &UserId) -> bool {
        self.contributor(node, user).is_some()
    }

    pub fn get_permissions(&self, node: &NodeId, user: &UserId) -> Vec<Permission> {
        self.contributor(node, user)
            .map(Contributor::permissions)
            .unwrap_or_default()
    }

    pub fn visible_contributor_ids(&self, node: &NodeId) -> Vec<UserId> {
        self.contributors_of(node)
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.user.clone())
            .collect()
    }

    pub fn admin_count(&self, node: &NodeId) -> usize {
        self.contributors_of(node).iter().filter(|c| c.admin).count()
    }

    // ── Permission resolution ──

    /// Direct grant of `permission`, or for `Read` only, admin on any
    /// strict ancestor.
    pub fn has_permission(&self, node: &NodeId, user: &UserId, permission: Permission) -> bool {
        self.has_permission_with(node, user, permission, true)
    }

    pub fn has_permission_with(
        &self,
        node: &NodeId,
        user: &UserId,
        permission: Permission,
        check_parent: bool,
    ) -> bool {
        let Some(contributor) = self.contributor(node, user) else {
            return false;
        };
        if contributor.has(permission) {
            return true;
        }
        if permission == Permission::Read && check_parent {
            return self.is_admin_parent(node, user);
        }
        false
    }

    /// Admin on the node itself or any ancestor.
    pub fn is_admin_parent(&self, node: &NodeId, user: &UserId) -> bool {
        let mut current = Some(node.clone());
        let mut hops = 0;
        while let Some(id) = current {
            if self.has_permission_with(&id, user, Permission::Admin, false) {
                return true;
            }
            hops += 1;
            if hops > self.nodes.len() {
                break;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent.clone());
        }
        false
    }

    pub fn can_edit(&self, node: &NodeId, user: &UserId) -> bool {
        self.has_permission(node, user, Permission::Write)
    }

    /// Public comment level: any logged-in viewer; otherwise contributors only.
    pub fn can_comment(&self, node: &NodeId, auth: &Auth) -> ModelResult<bool> {
        let record = self.node(node)?;
        let Some(user) = &auth.user else {
            return Ok(false);
        };
        Ok(record.is_public || self.has_permission(node, user, Permission::Read))
    }

    // ── Mutations ──

    /// Add a contributor. A merged account resolves to its survivor.
    ///
    /// Returns `false` when the user already contributes; if permissions were
    /// given they replace the existing ones.
    pub fn add_contributor(
        &mut self,
        node: &NodeId,
        user: &UserId,
        permissions: Option<&[Permission]>,
        visible: bool,
        auth: Option<&UserId>,
        log: bool,
    ) -> ModelResult<bool> {
        self.node(node)?;
        let user = self.canonical_user(user)?;
        if self.is_contributor(node, &user) {
            if let Some(permissions) = permissions {
                self.set_permissions(node, &user, permissions, true)?;
            }
            return Ok(false);
        }

        let permissions = permissions.unwrap_or(Permission::DEFAULT_CONTRIBUTOR);
        let mut contributor = Contributor::new(node, &user, Permission::Read, visible);
        contributor.apply(&expand_all(permissions));
        self.contributors
            .entry(node.clone())
            .or_default()
            .push(contributor);

        if log {
            let parent = self.node(node)?.parent.clone();
            let mut entry = NewLog::new(LogAction::ContribAdded).params(json!({
                "project": parent,
                "node": node,
                "contributors": [user],
            }));
            if let Some(actor) = auth {
                entry = entry.user(actor);
            }
            self.add_log(node, entry)?;
        }
        self.emit(ModelEvent::ContributorAdded {
            node: node.clone(),
            contributor: user.clone(),
            added_by: auth.cloned(),
        });
        info!(node = %node, contributor = %user, "contributor added");
        Ok(true)
    }

    /// Add several contributors under a single log entry.
    pub fn add_contributors(
        &mut self,
        node: &NodeId,
        batch: &[ContributorSpec],
        auth: Option<&UserId>,
    ) -> ModelResult<()> {
        let mut added = Vec::new();
        for spec in batch {
            if self.add_contributor(
                node,
                &spec.user,
                Some(&spec.permissions),
                spec.visible,
                auth,
                false,
            )? {
                added.push(spec.user.clone());
            }
        }
        if !added.is_empty() {
            let parent = self.node(node)?.parent.clone();
            let mut entry = NewLog::new(LogAction::ContribAdded).params(json!({
                "project": parent,
                "node": node,
                "contributors": added,
            }));
            if let Some(actor) = auth {
                entry = entry.user(actor);
            }
            self.add_log(node, entry)?;
        }
        Ok(())
    }

    /// Replace a contributor's flags with exactly `permissions`.
    ///
    /// With `validate`, refuses to demote the node's only admin. The check
    /// runs before any flag is written.
    pub fn set_permissions(
        &mut self,
        node: &NodeId,
        user: &UserId,
        permissions: &[Permission],
        validate: bool,
    ) -> ModelResult<()> {
        let current = self
            .contributor(node, user)
            .ok_or_else(|| ModelError::value(format!("User {} not in contributors", user)))?;
        let demoting_admin = current.admin && !permissions.contains(&Permission::Admin);
        if validate && demoting_admin && self.admin_count(node) <= 1 {
            return Err(ModelError::node_state(
                "Must have at least one registered admin contributor",
            ));
        }
        self.contributor_mut(node, user)?.apply(permissions);
        debug!(node = %node, user = %user, ?permissions, "permissions set");
        Ok(())
    }

    /// Grant `permission` and everything below it.
    pub fn add_permission(
        &mut self,
        node: &NodeId,
        user: &UserId,
        permission: Permission,
    ) -> ModelResult<()> {
        let contributor = self.contributor_mut(node, user)?;
        if contributor.has(permission) {
            return Err(ModelError::value(format!(
                "User already has permission {}",
                permission
            )));
        }
        for level in permission.expand() {
            match level {
                Permission::Read => contributor.read = true,
                Permission::Write => contributor.write = true,
                Permission::Admin => contributor.admin = true,
            }
        }
        Ok(())
    }

    /// Change a contributor's bibliographic visibility. Hiding the last
    /// visible contributor fails.
    pub fn set_visible(
        &mut self,
        node: &NodeId,
        user: &UserId,
        visible: bool,
        auth: Option<&UserId>,
        log: bool,
    ) -> ModelResult<()> {
        let current = self
            .contributor(node, user)
            .ok_or_else(|| ModelError::value(format!("User {} not in contributors", user)))?;
        if current.visible == visible {
            return Ok(());
        }
        if !visible && self.visible_contributor_ids(node).len() <= 1 {
            return Err(ModelError::node_state(
                "Must have at least one visible contributor",
            ));
        }
        self.contributor_mut(node, user)?.visible = visible;

        if log {
            let action = if visible {
                LogAction::MadeContributorVisible
            } else {
                LogAction::MadeContributorInvisible
            };
            let parent = self.node(node)?.parent.clone();
            let mut entry = NewLog::new(action).params(json!({
                "parent": parent,
                "node": node,
                "contributors": [user],
            }));
            if let Some(actor) = auth {
                entry = entry.user(actor);
            }
            self.add_log(node, entry)?;
        }
        Ok(())
    }

    /// Remove a contributor, keeping at least one admin and one visible
    /// contributor on the node.
    pub fn remove_contributor(
        &mut self,
        node: &NodeId,
        user: &UserId,
        auth: &UserId,
    ) -> ModelResult<()> {
        let target = self
            .contributor(node, user)
            .ok_or_else(|| ModelError::value(format!("User {} not in contributors", user)))?;
        if auth != user && !self.has_permission(node, auth, Permission::Admin) {
            return Err(ModelError::permissions(
                "Only admins can remove other contributors",
            ));
        }
        let remaining = self.contributors_of(node).iter().filter(|c| &c.user != user);
        let (mut admins, mut visible) = (0, 0);
        for c in remaining {
            admins += usize::from(c.admin);
            visible += usize::from(c.visible);
        }
        if target.admin && admins == 0 {
            return Err(ModelError::node_state(
                "Must have at least one registered admin contributor",
            ));
        }
        if target.visible && visible == 0 {
            return Err(ModelError::node_state(
                "Must have at least one visible contributor",
            ));
        }

        if let Some(list) = self.contributors.get_mut(node) {
            list.retain(|c| &c.user != user);
        }
        let parent = self.node(node)?.parent.clone();
        self.add_log(
            node,
            NewLog::new(LogAction::ContribRemoved)
                .params(json!({
                    "project": parent,
                    "node": node,
                    "contributors": [user],
                }))
                .user(auth),
        )?;
        info!(node = %node, contributor = %user, "contributor removed");
        Ok(())
    }

    /// Bulk-duplicate `source`'s contributor records (identity, flags,
    /// visibility) onto `target`.
    pub(crate) fn copy_contributors_from(&mut self, source: &NodeId, target: &NodeId) {
        let copies: Vec<Contributor> = self
            .contributors_of(source)
            .iter()
            .map(|c| Contributor {
                node: target.clone(),
                ..c.clone()
            })
            .collect();
        self.contributors.insert(target.clone(), copies);
    }

    /// `(admin, node)` pairs over the node and its primary descendants,
    /// deduplicated by user in first-seen order. Inactive users and link
    /// targets are skipped.
    pub fn admin_contributors_recursive(&self, node: &NodeId) -> ModelResult<Vec<(UserId, NodeId)>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for id in self.node_and_primary_descendants(node)? {
            for contributor in self.contributors_of(&id) {
                if !contributor.admin {
                    continue;
                }
                let active = self
                    .users
                    .get(&contributor.user)
                    .is_some_and(|u| u.is_active);
                if active && seen.insert(contributor.user.clone()) {
                    out.push((contributor.user.clone(), id.clone()));
                }
            }
        }
        Ok(out)
    }
}

/// Union of the listed levels and everything they imply.
fn expand_all(permissions: &[Permission]) -> Vec<Permission> {
    let mut out: Vec<Permission> = permissions
        .iter()
        .flat_map(|p| p.expand().iter().copied())
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use osf_types::NodeCategory;

    fn project() -> (NodeGraph, UserId, NodeId) {
        let mut graph = NodeGraph::new(ModelConfig::default());
        let owner = graph.create_user("Owner").unwrap();
        let node = graph
            .create_project(&owner, "Project", NodeCategory::Project, None)
            .unwrap();
        (graph, owner, node)
    }

    #[test]
    fn test_sole_admin_cannot_be_demoted() {
        let (mut graph, owner, node) = project();
        let before = graph.contributors_of(&node).to_vec();

        let err = graph
            .set_permissions(&node, &owner, &[Permission::Read, Permission::Write], true)
            .unwrap_err();
        assert!(matches!(err, ModelError::NodeState(_)));
        assert_eq!(graph.contributors_of(&node), before.as_slice());
    }

    #[test]
    fn test_admin_can_be_demoted_when_another_admin_exists() {
        let (mut graph, owner, node) = project();
        let other = graph.create_user("Other").unwrap();
        graph
            .add_contributor(&node, &other, Some(&[Permission::Admin]), true, Some(&owner), true)
            .unwrap();
        graph
            .set_permissions(&node, &owner, &[Permission::Read], true)
            .unwrap();
        assert_eq!(graph.get_permissions(&node, &owner), vec![Permission::Read]);
        assert_eq!(graph.admin_count(&node), 1);
    }

    #[test]
    fn test_sole_visible_contributor_cannot_be_hidden() {
        let (mut graph, owner, node) = project();
        let other = graph.create_user("Other").unwrap();
        graph
            .add_contributor(&node, &other, None, false, Some(&owner), true)
            .unwrap();

        let err = graph
            .set_visible(&node, &owner, false, Some(&owner), true)
            .unwrap_err();
        assert!(matches!(err, ModelError::NodeState(_)));
        assert!(graph.contributor(&node, &owner).unwrap().visible);

        graph
            .set_visible(&node, &other, true, Some(&owner), true)
            .unwrap();
        graph
            .set_visible(&node, &owner, false, Some(&owner), true)
            .unwrap();
        assert_eq!(graph.visible_contributor_ids(&node), vec![other]);
        assert_eq!(
            graph.logs_for(&node).last().unwrap().action,
            LogAction::MadeContributorInvisible
        );
    }

    #[test]
    fn test_remove_contributor_keeps_invariants() {
        let (mut graph, owner, node) = project();
        let writer = graph.create_user("Writer").unwrap();
        graph
            .add_contributor(&node, &writer, None, false, Some(&owner), true)
            .unwrap();

        // Owner is the only admin and the only visible contributor.
        assert!(graph.remove_contributor(&node, &owner, &owner).is_err());
        assert_eq!(graph.contributors_of(&node).len(), 2);

        assert!(matches!(
            graph.remove_contributor(&node, &owner, &writer),
            Err(ModelError::Permissions(_))
        ));
        graph.remove_contributor(&node, &writer, &owner).unwrap();
        assert!(!graph.is_contributor(&node, &writer));
    }

    #[test]
    fn test_read_inherited_from_ancestor_admin_only() {
        let (mut graph, owner, node) = project();
        let child = graph
            .create_project(&owner, "Child", NodeCategory::Data, Some(&node))
            .unwrap();
        let outsider = graph.create_user("Outsider").unwrap();
        // Owner administers the parent and is listed on the child as read-only.
        graph
            .add_contributor(&child, &outsider, Some(&[Permission::Admin]), true, Some(&owner), false)
            .unwrap();
        graph
            .set_permissions(&child, &owner, &[Permission::Read], true)
            .unwrap();

        assert!(graph.has_permission(&child, &owner, Permission::Read));
        assert!(!graph.has_permission(&child, &owner, Permission::Write));
        assert!(graph.has_permission_with(&child, &outsider, Permission::Admin, false));
        assert!(graph.is_admin_parent(&child, &owner));
        assert!(!graph.is_admin_parent(&node, &outsider));
    }

    #[test]
    fn test_non_contributor_has_nothing_even_as_ancestor_admin() {
        let (mut graph, owner, node) = project();
        let other = graph.create_user("Other").unwrap();
        let child = graph
            .create_project(&owner, "Child", NodeCategory::Data, Some(&node))
            .unwrap();
        graph
            .add_contributor(&node, &other, Some(&[Permission::Admin]), true, Some(&owner), false)
            .unwrap();
        // Contributor record is required before ancestor admin grants read.
        assert!(!graph.has_permission(&child, &other, Permission::Read));
        assert!(graph.is_admin_parent(&child, &other));
    }

    #[test]
    fn test_re_adding_with_permissions_overrides() {
        let (mut graph, owner, node) = project();
        let other = graph.create_user("Other").unwrap();
        assert!(graph
            .add_contributor(&node, &other, None, true, Some(&owner), true)
            .unwrap());
        assert!(!graph
            .add_contributor(&node, &other, Some(&[Permission::Admin]), true, Some(&owner), true)
            .unwrap());
        assert!(graph.has_permission(&node, &other, Permission::Admin));
        assert!(graph.has_permission(&node, &other, Permission::Read));
    }

    #[test]
    fn test_merged_user_resolves_to_survivor() {
        let (mut graph, owner, node) = project();
        let old = graph.create_user("Old Account").unwrap();
        let new = graph.create_user("New Account").unwrap();
        graph.merge_user(&old, &new).unwrap();
        graph
            .add_contributor(&node, &old, None, true, Some(&owner), true)
            .unwrap();
        assert!(graph.is_contributor(&node, &new));
        assert!(!graph.is_contributor(&node, &old));
    }

    #[test]
    fn test_add_permission_expands_and_rejects_duplicates() {
        let (mut graph, owner, node) = project();
        let other = graph.create_user("Other").unwrap();
        graph
            .add_contributor(&node, &other, Some(&[Permission::Read]), true, Some(&owner), false)
            .unwrap();
        graph.add_permission(&node, &other, Permission::Admin).unwrap();
        assert_eq!(graph.get_permissions(&node, &other).len(), 3);
        assert!(graph.add_permission(&node, &other, Permission::Write).is_err());
    }

    #[test]
    fn test_batch_add_writes_one_log() {
        let (mut graph, owner, node) = project();
        let a = graph.create_user("A").unwrap();
        let b = graph.create_user("B").unwrap();
        let batch = vec![
            ContributorSpec { user: a.clone(), permissions: vec![Permission::Read], visible: true },
            ContributorSpec { user: b.clone(), permissions: vec![Permission::Write], visible: false },
        ];
        let logs_before = graph.logs_for(&node).len();
        graph.add_contributors(&node, &batch, Some(&owner)).unwrap();

        let logs = graph.logs_for(&node);
        assert_eq!(logs.len(), logs_before + 1);
        assert_eq!(logs.last().unwrap().params["contributors"], json!([a, b]));
        assert!(graph.has_permission(&node, &b, Permission::Read));
    }

    #[test]
    fn test_admin_collection_dedupes_and_skips_inactive() {
        let (mut graph, owner, node) = project();
        let child = graph
            .create_project(&owner, "Child", NodeCategory::Data, Some(&node))
            .unwrap();
        let second = graph.create_user("Second Admin").unwrap();
        let gone = graph.create_user("Gone Admin").unwrap();
        graph
            .add_contributor(&child, &second, Some(&[Permission::Admin]), true, Some(&owner), false)
            .unwrap();
        graph
            .add_contributor(&child, &gone, Some(&[Permission::Admin]), true, Some(&owner), false)
            .unwrap();
        graph.deactivate_user(&gone).unwrap();

        let admins = graph.admin_contributors_recursive(&node).unwrap();
        assert_eq!(admins, vec![(owner, node.clone()), (second, child)]);
    }
}
