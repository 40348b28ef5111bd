//! ModelConfig: policy constants for sanctions, archival and guid allocation.
//!
//! Loaded once at startup from environment variables. Every window and bound
//! the sanction workflows check flows through here.

use chrono::Duration;
use osf_types::SanctionKind;

/// Time bounds for the sanction workflows.
#[derive(Debug, Clone)]
pub struct SanctionPolicy {
    /// Shortest embargo allowed, measured from initiation.
    pub embargo_min: Duration,
    /// Longest embargo allowed, measured from initiation.
    pub embargo_max: Duration,
    /// How long admins have to act on a registration approval before it auto-approves.
    pub registration_approval_window: Duration,
    pub embargo_pending_window: Duration,
    pub retraction_pending_window: Duration,
    pub embargo_termination_window: Duration,
}

impl Default for SanctionPolicy {
    fn default() -> Self {
        Self {
            embargo_min: Duration::days(3),
            embargo_max: Duration::days(1460),
            registration_approval_window: Duration::hours(48),
            embargo_pending_window: Duration::hours(48),
            retraction_pending_window: Duration::hours(48),
            embargo_termination_window: Duration::hours(48),
        }
    }
}

impl SanctionPolicy {
    /// How long a sanction of `kind` may wait on its authorizers before
    /// the sweeper approves it.
    pub fn pending_window(&self, kind: SanctionKind) -> Duration {
        match kind {
            SanctionKind::RegistrationApproval => self.registration_approval_window,
            SanctionKind::Embargo => self.embargo_pending_window,
            SanctionKind::Retraction => self.retraction_pending_window,
            SanctionKind::EmbargoTerminationApproval => self.embargo_termination_window,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            embargo_min: env_days("OSF_EMBARGO_MIN_DAYS", defaults.embargo_min),
            embargo_max: env_days("OSF_EMBARGO_MAX_DAYS", defaults.embargo_max),
            registration_approval_window: env_hours(
                "OSF_REGISTRATION_APPROVAL_HOURS",
                defaults.registration_approval_window,
            ),
            embargo_pending_window: env_hours(
                "OSF_EMBARGO_PENDING_HOURS",
                defaults.embargo_pending_window,
            ),
            retraction_pending_window: env_hours(
                "OSF_RETRACTION_PENDING_HOURS",
                defaults.retraction_pending_window,
            ),
            embargo_termination_window: env_hours(
                "OSF_EMBARGO_TERMINATION_HOURS",
                defaults.embargo_termination_window,
            ),
        }
    }
}

/// Top-level configuration for a node graph.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub sanctions: SanctionPolicy,
    /// Emit `after_create_registration` so the archiver copies files.
    pub enable_archiver: bool,
    pub guid_length: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sanctions: SanctionPolicy::default(),
            enable_archiver: true,
            guid_length: 5,
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sanctions: SanctionPolicy::from_env(),
            enable_archiver: env_bool("OSF_ENABLE_ARCHIVER", defaults.enable_archiver),
            guid_length: env_parse("OSF_GUID_LENGTH", defaults.guid_length),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}='{}'", key, v);
            default
        }),
        Err(_) => default,
    }
}

fn env_days(key: &str, default: Duration) -> Duration {
    Duration::days(env_parse(key, default.num_days()))
}

fn env_hours(key: &str, default: Duration) -> Duration {
    Duration::hours(env_parse(key, default.num_hours()))
}
