// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User model for storage and API.

use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How a user account was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Email + password registration
    Local,
    /// Google sign-in
    Federated,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Local => f.write_str("local"),
            Provider::Federated => f.write_str("federated"),
        }
    }
}

/// User record stored in Firestore (keyed by `user_id`, unique by `email`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque identifier generated at creation (also used as document ID)
    pub user_id: String,
    /// Display name
    pub user_name: String,
    /// Email address, exact-match unique key
    pub email: String,
    /// Argon2 PHC string; only present for local accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Provider tag, fixed at creation
    pub provider: Provider,
    /// When the account was created (RFC3339)
    pub created_at: String,
}

impl User {
    pub fn new_local(user_name: String, email: String, password_hash: String) -> Self {
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            user_name,
            email,
            password_hash: Some(password_hash),
            provider: Provider::Local,
            created_at: crate::time_utils::now_rfc3339(),
        }
    }

    pub fn new_federated(user_name: String, email: String) -> Self {
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            user_name,
            email,
            password_hash: None,
            provider: Provider::Federated,
            created_at: crate::time_utils::now_rfc3339(),
        }
    }

    /// Public view without the password hash.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            email: self.email.clone(),
            provider: self.provider,
        }
    }
}

/// Profile fields safe to return from any read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PublicUser {
    pub user_id: String,
    pub user_name: String,
    pub email: String,
    pub provider: Provider,
}
