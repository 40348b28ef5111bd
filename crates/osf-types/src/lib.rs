//! Shared Model Types for OSF
//!
//! Types that cross the boundary between the model layer and its collaborators
//! (storage, API layer, schedulers): identifiers, permission levels, log
//! actions, sanction kinds and states, node categories.
//!
//! ## Rules
//!
//! 1. Wire names match the stored string values (`"project_created"`, `"admin"`, ...)
//! 2. Enums serialize as snake_case strings
//! 3. Ids are strings on the wire

pub mod ids;
pub mod log_action;
pub mod node;
pub mod permissions;
pub mod sanction;

pub use ids::{Guid, GuidParseError, LogId, NodeId, SanctionId, UserId, GUID_ALPHABET};
pub use log_action::LogAction;
pub use node::{NodeCategory, Privacy};
pub use permissions::Permission;
pub use sanction::{ApprovalStatus, SanctionKind, SanctionState};
