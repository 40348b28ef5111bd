//! Users, institutions and request auth

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use osf_types::UserId;

use super::NodeGraph;
use crate::error::{ModelError, ModelResult, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub fullname: String,
    /// Inactive users are never asked to authorize sanctions.
    pub is_active: bool,
    pub is_registered: bool,
    /// Account this one was merged into, if any.
    pub merged_by: Option<UserId>,
    pub affiliated_institutions: BTreeSet<String>,
    pub date_registered: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Institution {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email_domains: Vec<String>,
}

/// Who is making a request: an optional logged-in user and an optional
/// private-link key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub user: Option<UserId>,
    pub private_key: Option<String>,
}

impl Auth {
    pub fn user(user: &UserId) -> Self {
        Self {
            user: Some(user.clone()),
            private_key: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    pub fn logged_in(&self) -> bool {
        self.user.is_some()
    }
}

impl NodeGraph {
    pub fn create_user(&mut self, fullname: &str) -> ModelResult<UserId> {
        let fullname = fullname.trim();
        if fullname.is_empty() {
            return Err(ValidationError::BlankField { field: "fullname" }.into());
        }
        let id = self.allocate_guid();
        self.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                fullname: fullname.to_string(),
                is_active: true,
                is_registered: true,
                merged_by: None,
                affiliated_institutions: BTreeSet::new(),
                date_registered: Utc::now(),
            },
        );
        info!(user = %id, "user created");
        Ok(id)
    }

    /// Fold `merged` into `into`. The merged account goes inactive and later
    /// contributor additions resolve to the surviving account.
    pub fn merge_user(&mut self, merged: &UserId, into: &UserId) -> ModelResult<()> {
        if merged == into {
            return Err(ModelError::value("A user cannot be merged into itself"));
        }
        if self.user(into)?.merged_by.is_some() {
            return Err(ModelError::value("Cannot merge into an account that was itself merged"));
        }
        let user = self
            .users
            .get_mut(merged)
            .ok_or_else(|| ModelError::not_found("user", merged))?;
        user.merged_by = Some(into.clone());
        user.is_active = false;
        info!(merged = %merged, into = %into, "user merged");
        Ok(())
    }

    pub fn deactivate_user(&mut self, user: &UserId) -> ModelResult<()> {
        let user = self
            .users
            .get_mut(user)
            .ok_or_else(|| ModelError::not_found("user", user))?;
        user.is_active = false;
        Ok(())
    }

    /// Follow `merged_by` to the surviving account.
    pub(crate) fn canonical_user(&self, user: &UserId) -> ModelResult<UserId> {
        let mut current = self.user(user)?;
        while let Some(next) = &current.merged_by {
            current = self.user(next)?;
        }
        Ok(current.id.clone())
    }

    pub fn create_institution(&mut self, id: &str, name: &str) -> ModelResult<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankField { field: "name" }.into());
        }
        self.institutions.insert(
            id.to_string(),
            Institution {
                id: id.to_string(),
                name: name.trim().to_string(),
                email_domains: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn institution(&self, id: &str) -> ModelResult<&Institution> {
        self.institutions
            .get(id)
            .ok_or_else(|| ModelError::not_found("institution", id))
    }

    pub fn affiliate_user(&mut self, user: &UserId, institution: &str) -> ModelResult<()> {
        self.institution(institution)?;
        let user = self
            .users
            .get_mut(user)
            .ok_or_else(|| ModelError::not_found("user", user))?;
        user.affiliated_institutions.insert(institution.to_string());
        Ok(())
    }
}
