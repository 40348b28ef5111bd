//! Model events and the non-blocking bus that delivers them
//!
//! Operations queue events on the graph while they run. The registry drains
//! the queue after a successful commit and hands each event to the bus, so a
//! failed operation never announces anything.
//!
//! `publish()` never blocks and never fails: a full or disconnected channel
//! drops the event with a warning and bumps the drop counter.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use osf_types::{NodeId, SanctionId, SanctionKind, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModelEvent {
    ProjectCreated {
        node: NodeId,
    },
    ContributorAdded {
        node: NodeId,
        contributor: UserId,
        added_by: Option<UserId>,
    },
    PrivacySetPublic {
        node: NodeId,
    },
    /// A registration tree was created and is ready for archival.
    AfterCreateRegistration {
        registration: NodeId,
        source: NodeId,
        archive: bool,
    },
    /// An authorizer must be told how to approve or reject.
    ApprovalRequested {
        sanction: SanctionId,
        kind: SanctionKind,
        user: UserId,
        node: NodeId,
    },
}

impl ModelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProjectCreated { .. } => "project_created",
            Self::ContributorAdded { .. } => "contributor_added",
            Self::PrivacySetPublic { .. } => "privacy_set_public",
            Self::AfterCreateRegistration { .. } => "after_create_registration",
            Self::ApprovalRequested { .. } => "approval_requested",
        }
    }
}

pub struct EventBus {
    sender: Sender<ModelEvent>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    /// Bus with room for `buffer_size` undelivered events.
    pub fn new(buffer_size: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = bounded(buffer_size);
        let bus = Self {
            sender,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (bus, EventReceiver { receiver })
    }

    pub fn publish(&self, event: ModelEvent) {
        let name = event.name();
        match self.sender.try_send(event) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event = name, "event bus full, event dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event = name, "event receiver gone, event dropped");
            }
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = ModelEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub dropped: u64,
}

/// Consumer side, held by whatever delivers mail or runs the archiver.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<ModelEvent>,
}

impl EventReceiver {
    /// Blocking receive. `None` once every bus is gone.
    pub fn recv(&self) -> Option<ModelEvent> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<ModelEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn drain(&self) -> Vec<ModelEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
