//! OSF Models - node tree, contributors, audit log, registrations and sanctions
//!
//! The [`NodeGraph`] arena holds every record; operations live in `impl
//! NodeGraph` blocks grouped by concern. [`Registry`] wraps a graph as a
//! transactional unit of work with snapshot persistence and event dispatch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use osf_models::{ModelConfig, NodeGraph, RegistrationSchema};
//! use osf_types::NodeCategory;
//!
//! let mut graph = NodeGraph::new(ModelConfig::default());
//! let user = graph.create_user("Ada Lovelace").unwrap();
//! let project = graph
//!     .create_project(&user, "Analytical Engine", NodeCategory::Project, None)
//!     .unwrap();
//! let schema = RegistrationSchema::new("open-ended", "Open-Ended Registration", 2);
//! let registration = graph
//!     .register_node(&project, &schema, &user, serde_json::json!({}), None)
//!     .unwrap();
//! let approval = graph.require_approval(&registration, &user).unwrap();
//! ```

// Core error handling
pub mod error;
pub mod config;

// Identity and the node arena
pub mod identity;
pub mod graph;

// Per-concern operations on the graph
pub mod contributor;
pub mod nodelog;
pub mod privacy;
pub mod registration;
pub mod sanction;
pub mod draft;

// Side channels and the unit of work
pub mod events;
pub mod store;
pub mod registry;

pub use config::{ModelConfig, SanctionPolicy};
pub use contributor::{Contributor, ContributorSpec};
pub use draft::{DraftAction, DraftRegistration};
pub use error::{ModelError, ModelResult, StoreError, TokenPurpose, ValidationError};
pub use events::{EventBus, EventReceiver, ModelEvent};
pub use graph::{
    Auth, Institution, Node, NodeGraph, NodeKind, NodeLicenseRecord, Referent, RegistrationInfo,
    RegistrationSchema, User,
};
pub use nodelog::{NewLog, NodeLog};
pub use privacy::PrivateLink;
pub use registry::Registry;
pub use sanction::sweep::SweepReport;
pub use sanction::{Authorizer, Decision, Sanction, SanctionDetails, SanctionEffect};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
