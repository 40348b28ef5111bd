//! Append-only audit log
//!
//! Logs are written by every mutating node operation and are never updated or
//! removed. Registration copies a source node's logs onto the new registration
//! with [`NodeGraph::clone_node_log`], which keeps the timestamp, acting user
//! and original node of the copied entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use osf_types::{LogAction, LogId, NodeId, UserId};

use crate::error::{ModelError, ModelResult};
use crate::graph::NodeGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLog {
    pub id: LogId,
    pub action: LogAction,
    #[serde(default)]
    pub params: Value,
    pub date: DateTime<Utc>,
    pub user: Option<UserId>,
    /// Node the entry is attached to.
    pub node: NodeId,
    /// Node the entry was first written on; differs from `node` on clones.
    pub original_node: NodeId,
    #[serde(default)]
    pub should_hide: bool,
}

/// Builder for a log entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewLog {
    action: LogAction,
    params: Value,
    user: Option<UserId>,
    date: Option<DateTime<Utc>>,
    touch: bool,
    hidden: bool,
}

impl NewLog {
    pub fn new(action: LogAction) -> Self {
        Self {
            action,
            params: Value::Object(Default::default()),
            user: None,
            date: None,
            touch: true,
            hidden: false,
        }
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn user(mut self, user: &UserId) -> Self {
        self.user = Some(user.clone());
        self
    }

    /// Record the entry at `date` instead of now.
    pub fn at(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Leave the node's `date_modified` alone.
    pub fn without_touch(mut self) -> Self {
        self.touch = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

impl NodeGraph {
    /// Append a log entry to `node`.
    ///
    /// Not idempotent: each call appends a new entry, so callers must never
    /// retry on failure.
    pub fn add_log(&mut self, node: &NodeId, entry: NewLog) -> ModelResult<LogId> {
        let date = entry.date.unwrap_or_else(Utc::now);
        let record = self.node_mut(node)?;
        if entry.touch {
            record.date_modified = date;
        }
        let log = NodeLog {
            id: Uuid::new_v4(),
            action: entry.action,
            params: entry.params,
            date,
            user: entry.user,
            node: node.clone(),
            original_node: node.clone(),
            should_hide: entry.hidden,
        };
        let id = log.id;
        debug!(node = %node, action = %log.action, log = %id, "log appended");
        self.logs.push(log);
        Ok(id)
    }

    pub fn log(&self, id: &LogId) -> ModelResult<&NodeLog> {
        self.logs
            .iter()
            .find(|l| &l.id == id)
            .ok_or_else(|| ModelError::not_found("log", id))
    }

    /// Logs attached to `node`, oldest first.
    pub fn logs_for(&self, node: &NodeId) -> Vec<&NodeLog> {
        self.logs.iter().filter(|l| &l.node == node).collect()
    }

    /// Copy a log onto `target`, keeping everything but the node binding.
    pub fn clone_node_log(&mut self, log_id: &LogId, target: &NodeId) -> ModelResult<LogId> {
        self.node(target)?;
        let source = self.log(log_id)?;
        let copy = NodeLog {
            id: Uuid::new_v4(),
            node: target.clone(),
            ..source.clone()
        };
        let id = copy.id;
        self.logs.push(copy);
        Ok(id)
    }
}
