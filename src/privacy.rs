//! Visibility: public/private switching, view checks and private links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use osf_types::{LogAction, NodeId, Permission, Privacy, UserId};

use crate::error::{ModelError, ModelResult};
use crate::events::ModelEvent;
use crate::graph::{Auth, NodeGraph};
use crate::identity::generate_token;
use crate::nodelog::NewLog;

/// Shareable key granting read access to a set of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateLink {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub nodes: Vec<NodeId>,
    /// Hide contributor identities from viewers using this link.
    pub anonymous: bool,
    pub is_deleted: bool,
    pub creator: UserId,
    pub date_created: DateTime<Utc>,
}

impl NodeGraph {
    /// Whether `auth` may view `node`.
    pub fn can_view(&self, node: &NodeId, auth: &Auth) -> ModelResult<bool> {
        let record = self.node(node)?;
        if let Some(key) = &auth.private_key {
            if let Some(link) = self.active_link(key) {
                if link.anonymous {
                    return Ok(link.nodes.contains(node));
                }
                if link.nodes.contains(node) {
                    return Ok(true);
                }
            }
        }
        if record.is_public {
            return Ok(true);
        }
        Ok(auth.user.as_ref().is_some_and(|user| {
            self.has_permission(node, user, Permission::Read) || self.is_admin_parent(node, user)
        }))
    }

    /// Switch a node between public and private.
    ///
    /// Returns `false` when nothing changed, including when making an
    /// embargoed registration public only requested early termination.
    pub fn set_privacy(
        &mut self,
        node: &NodeId,
        privacy: Privacy,
        auth: Option<&UserId>,
        log: bool,
    ) -> ModelResult<bool> {
        self.node(node)?;
        if let Some(user) = auth {
            if !self.has_permission(node, user, Permission::Admin) {
                return Err(ModelError::permissions(
                    "Must be an admin to change privacy settings",
                ));
            }
        }
        self.change_privacy(node, privacy, auth, log)
    }

    /// `set_privacy` without the admin check, for callers that already
    /// authorized `auth` on the registration root.
    pub(crate) fn change_privacy(
        &mut self,
        node: &NodeId,
        privacy: Privacy,
        auth: Option<&UserId>,
        log: bool,
    ) -> ModelResult<bool> {
        let record = self.node(node)?;
        let is_registration = record.is_registration();
        match (privacy, record.is_public) {
            (Privacy::Public, false) => {
                if is_registration {
                    if self.is_pending_embargo(node) {
                        return Err(ModelError::node_state(
                            "A registration with an unapproved embargo cannot be made public",
                        ));
                    }
                    if self.is_pending_registration(node) {
                        return Err(ModelError::node_state(
                            "An unapproved registration cannot be made public",
                        ));
                    }
                    if self.is_embargoed(node) {
                        let user = auth.ok_or_else(|| {
                            ModelError::permissions(
                                "Ending an embargo early requires an acting admin",
                            )
                        })?;
                        self.request_embargo_termination(node, user)?;
                        return Ok(false);
                    }
                }
                self.node_mut(node)?.is_public = true;
            }
            (Privacy::Private, true) => {
                if is_registration && !self.is_pending_embargo(node) {
                    return Err(ModelError::node_state(
                        "Public registrations must be withdrawn, not made private",
                    ));
                }
                self.node_mut(node)?.is_public = false;
            }
            _ => return Ok(false),
        }

        if log {
            let action = match privacy {
                Privacy::Public => LogAction::MadePublic,
                Privacy::Private => LogAction::MadePrivate,
            };
            let parent = self.node(node)?.parent.clone();
            let mut entry =
                NewLog::new(action).params(json!({ "project": parent, "node": node }));
            if let Some(user) = auth {
                entry = entry.user(user);
            }
            self.add_log(node, entry)?;
        }
        if privacy == Privacy::Public {
            self.emit(ModelEvent::PrivacySetPublic { node: node.clone() });
        }
        info!(node = %node, privacy = %privacy, "privacy changed");
        Ok(true)
    }

    // ── Private links ──

    pub fn create_private_link(
        &mut self,
        creator: &UserId,
        nodes: &[NodeId],
        name: &str,
        anonymous: bool,
    ) -> ModelResult<Uuid> {
        if nodes.is_empty() {
            return Err(ModelError::value("A private link must cover at least one node"));
        }
        for node in nodes {
            self.node(node)?;
            if !self.has_permission(node, creator, Permission::Admin) {
                return Err(ModelError::permissions(format!(
                    "Must be an admin on {} to share it",
                    node
                )));
            }
        }
        let link = PrivateLink {
            id: Uuid::new_v4(),
            key: generate_token(),
            name: name.trim().to_string(),
            nodes: nodes.to_vec(),
            anonymous,
            is_deleted: false,
            creator: creator.clone(),
            date_created: Utc::now(),
        };
        let id = link.id;
        self.private_links.push(link);
        Ok(id)
    }

    pub fn private_link(&self, id: &Uuid) -> ModelResult<&PrivateLink> {
        self.private_links
            .iter()
            .find(|l| &l.id == id)
            .ok_or_else(|| ModelError::not_found("private link", id))
    }

    pub fn delete_private_link(&mut self, id: &Uuid, user: &UserId) -> ModelResult<()> {
        let link = self.private_link(id)?;
        let allowed = link
            .nodes
            .iter()
            .any(|node| self.has_permission(node, user, Permission::Admin));
        if !allowed {
            return Err(ModelError::permissions("Must be an admin to delete a private link"));
        }
        if let Some(link) = self.private_links.iter_mut().find(|l| &l.id == id) {
            link.is_deleted = true;
        }
        Ok(())
    }

    /// Keys of every non-deleted link covering `node`.
    pub fn private_link_keys_active(&self, node: &NodeId) -> Vec<&str> {
        self.private_links
            .iter()
            .filter(|l| !l.is_deleted && l.nodes.contains(node))
            .map(|l| l.key.as_str())
            .collect()
    }

    fn active_link(&self, key: &str) -> Option<&PrivateLink> {
        self.private_links
            .iter()
            .find(|l| !l.is_deleted && l.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use chrono::Duration;
    use osf_types::NodeCategory;

    fn setup() -> (NodeGraph, UserId, NodeId) {
        let mut graph = NodeGraph::new(ModelConfig::default());
        let user = graph.create_user("Emmy Noether").unwrap();
        let node = graph
            .create_project(&user, "Invariants", NodeCategory::Project, None)
            .unwrap();
        (graph, user, node)
    }

    #[test]
    fn test_private_node_visible_to_contributors_and_link_holders() {
        let (mut graph, user, node) = setup();
        let stranger = graph.create_user("Stranger").unwrap();
        assert!(graph.can_view(&node, &Auth::user(&user)).unwrap());
        assert!(!graph.can_view(&node, &Auth::user(&stranger)).unwrap());
        assert!(!graph.can_view(&node, &Auth::anonymous()).unwrap());

        let link = graph
            .create_private_link(&user, &[node.clone()], "review", false)
            .unwrap();
        let key = graph.private_link(&link).unwrap().key.clone();
        assert_eq!(graph.private_link_keys_active(&node), vec![key.as_str()]);
        assert!(graph
            .can_view(&node, &Auth::anonymous().with_private_key(key.clone()))
            .unwrap());

        graph.delete_private_link(&link, &user).unwrap();
        assert!(!graph
            .can_view(&node, &Auth::anonymous().with_private_key(key))
            .unwrap());
    }

    #[test]
    fn test_anonymous_link_scoped_to_its_nodes() {
        let (mut graph, user, node) = setup();
        let other = graph
            .create_project(&user, "Other", NodeCategory::Project, None)
            .unwrap();
        graph.set_privacy(&other, Privacy::Public, Some(&user), true).unwrap();
        let link = graph
            .create_private_link(&user, &[node.clone()], "blind", true)
            .unwrap();
        let key = graph.private_link(&link).unwrap().key.clone();
        let auth = Auth::anonymous().with_private_key(key);

        assert!(graph.can_view(&node, &auth).unwrap());
        assert!(!graph.can_view(&other, &auth).unwrap());
    }

    #[test]
    fn test_set_privacy_logs_and_emits() {
        let (mut graph, user, node) = setup();
        graph.take_events();
        assert!(graph.set_privacy(&node, Privacy::Public, Some(&user), true).unwrap());
        assert!(!graph.set_privacy(&node, Privacy::Public, Some(&user), true).unwrap());

        assert_eq!(
            graph.logs_for(&node).last().unwrap().action,
            LogAction::MadePublic
        );
        assert_eq!(
            graph.take_events(),
            vec![ModelEvent::PrivacySetPublic { node: node.clone() }]
        );
    }

    #[test]
    fn test_non_admin_cannot_change_privacy() {
        let (mut graph, user, node) = setup();
        let writer = graph.create_user("Writer").unwrap();
        graph
            .add_contributor(&node, &writer, None, true, Some(&user), false)
            .unwrap();
        assert!(matches!(
            graph.set_privacy(&node, Privacy::Public, Some(&writer), true),
            Err(ModelError::Permissions(_))
        ));
        assert!(!graph.node(&node).unwrap().is_public);
    }

    #[test]
    fn test_registration_privacy_rules() {
        let (mut graph, user, node) = setup();
        let schema = crate::graph::RegistrationSchema::new("open-ended", "Open-Ended", 1);
        let reg = graph
            .register_node(&node, &schema, &user, json!({}), None)
            .unwrap();

        let embargo = graph
            .embargo_registration(&reg, &user, Utc::now() + Duration::days(10), true)
            .unwrap();
        assert!(matches!(
            graph.set_privacy(&reg, Privacy::Public, Some(&user), true),
            Err(ModelError::NodeState(_))
        ));

        let token = graph
            .sanction(&embargo)
            .unwrap()
            .approval_token(&user)
            .unwrap()
            .to_string();
        graph.approve_sanction(&embargo, &user, &token).unwrap();
        assert!(graph.is_embargoed(&reg));

        // Making an embargoed registration public asks for early termination.
        assert!(!graph.set_privacy(&reg, Privacy::Public, Some(&user), true).unwrap());
        assert!(graph.is_pending_embargo_termination(&reg));
        assert!(!graph.node(&reg).unwrap().is_public);
    }

    #[test]
    fn test_public_registration_cannot_be_made_private() {
        let (mut graph, user, node) = setup();
        let schema = crate::graph::RegistrationSchema::new("open-ended", "Open-Ended", 1);
        let reg = graph
            .register_node(&node, &schema, &user, json!({}), None)
            .unwrap();
        graph.set_privacy(&reg, Privacy::Public, Some(&user), true).unwrap();
        assert!(matches!(
            graph.set_privacy(&reg, Privacy::Private, Some(&user), true),
            Err(ModelError::NodeState(_))
        ));
    }
}
