//! Registry: the transactional facade over the node graph
//!
//! Every mutating operation runs against a private copy of the graph under
//! the write lock. The copy replaces the committed graph only when the
//! operation succeeds and the snapshot is stored, so check-then-write
//! sequences are atomic and a failed recursive registration leaves nothing
//! behind. Events raised by the operation are published after the commit.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use osf_types::{LogId, NodeId, Permission, Privacy, SanctionId, SanctionState, UserId};

use crate::config::ModelConfig;
use crate::error::ModelResult;
use crate::events::EventBus;
use crate::graph::{NodeGraph, RegistrationSchema};
use crate::nodelog::NewLog;
use crate::sanction::sweep::SweepReport;
use crate::store::SnapshotStore;

pub struct Registry {
    graph: RwLock<NodeGraph>,
    store: Arc<dyn SnapshotStore>,
    bus: Option<EventBus>,
}

impl Registry {
    pub fn new(graph: NodeGraph, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            graph: RwLock::new(graph),
            store,
            bus: None,
        }
    }

    /// Load the stored snapshot, or start empty.
    pub async fn open(config: ModelConfig, store: Arc<dyn SnapshotStore>) -> ModelResult<Self> {
        let graph = match store.load().await? {
            Some(graph) => {
                info!(nodes = graph.nodes().count(), "snapshot loaded");
                graph.with_config(config)
            }
            None => NodeGraph::new(config),
        };
        Ok(Self::new(graph, store))
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }

    /// Run `f` against the committed graph.
    pub async fn read<R>(&self, f: impl FnOnce(&NodeGraph) -> R) -> R {
        let guard = self.graph.read().await;
        f(&guard)
    }

    /// Run `f` as one unit of work. Nothing `f` did is visible unless it
    /// returns `Ok` and the snapshot is stored.
    pub async fn transact<R>(
        &self,
        f: impl FnOnce(&mut NodeGraph) -> ModelResult<R>,
    ) -> ModelResult<R> {
        let mut guard = self.graph.write().await;
        let mut working = guard.clone();
        working.take_events();

        let result = f(&mut working)?;
        let events = working.take_events();
        self.store.save(&working).await?;
        *guard = working;
        drop(guard);

        debug!(events = events.len(), "transaction committed");
        if let Some(bus) = &self.bus {
            bus.publish_all(events);
        }
        Ok(result)
    }

    // ── Exposed operations ──

    pub async fn register_node(
        &self,
        source: &NodeId,
        schema: &RegistrationSchema,
        user: &UserId,
        answers: Value,
    ) -> ModelResult<NodeId> {
        self.transact(|g| g.register_node(source, schema, user, answers, None))
            .await
    }

    pub async fn embargo_registration(
        &self,
        registration: &NodeId,
        user: &UserId,
        end_date: DateTime<Utc>,
        for_existing_registration: bool,
    ) -> ModelResult<SanctionId> {
        self.transact(|g| {
            g.embargo_registration(registration, user, end_date, for_existing_registration)
        })
        .await
    }

    pub async fn retract_registration(
        &self,
        registration: &NodeId,
        user: &UserId,
        justification: Option<String>,
    ) -> ModelResult<SanctionId> {
        self.transact(|g| g.retract_registration(registration, user, justification))
            .await
    }

    pub async fn require_approval(
        &self,
        registration: &NodeId,
        user: &UserId,
    ) -> ModelResult<SanctionId> {
        self.transact(|g| g.require_approval(registration, user)).await
    }

    pub async fn approve(
        &self,
        sanction: &SanctionId,
        user: &UserId,
        token: &str,
    ) -> ModelResult<SanctionState> {
        self.transact(|g| g.approve_sanction(sanction, user, token))
            .await
    }

    pub async fn reject(
        &self,
        sanction: &SanctionId,
        user: &UserId,
        token: &str,
    ) -> ModelResult<SanctionState> {
        self.transact(|g| g.reject_sanction(sanction, user, token))
            .await
    }

    pub async fn terminate_embargo(
        &self,
        registration: &NodeId,
        actor: Option<&UserId>,
    ) -> ModelResult<()> {
        self.transact(|g| g.terminate_embargo(registration, actor))
            .await
    }

    pub async fn add_contributor(
        &self,
        node: &NodeId,
        user: &UserId,
        permissions: Option<&[Permission]>,
        visible: bool,
        auth: &UserId,
    ) -> ModelResult<bool> {
        self.transact(|g| g.add_contributor(node, user, permissions, visible, Some(auth), true))
            .await
    }

    pub async fn set_permissions(
        &self,
        node: &NodeId,
        user: &UserId,
        permissions: &[Permission],
    ) -> ModelResult<()> {
        self.transact(|g| g.set_permissions(node, user, permissions, true))
            .await
    }

    pub async fn set_privacy(
        &self,
        node: &NodeId,
        privacy: Privacy,
        auth: Option<&UserId>,
    ) -> ModelResult<bool> {
        self.transact(|g| g.set_privacy(node, privacy, auth, true))
            .await
    }

    pub async fn add_log(&self, node: &NodeId, entry: NewLog) -> ModelResult<LogId> {
        self.transact(|g| g.add_log(node, entry)).await
    }

    pub async fn register_draft(&self, draft: &Uuid, user: &UserId) -> ModelResult<NodeId> {
        self.transact(|g| g.register_draft(draft, user)).await
    }

    /// Run both sanction sweeps as one unit of work.
    pub async fn sweep(&self, now: DateTime<Utc>) -> ModelResult<SweepReport> {
        self.transact(|g| g.sweep_sanctions(now)).await
    }
}
