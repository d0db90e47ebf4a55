// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential flows: register, login, refresh and federated sign-in.
//!
//! Inputs arrive already validated for shape; this layer owns the account
//! rules and token issuance. Cookies are set by the route handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::db::{bounded, TrackerStore};
use crate::error::{AppError, Result};
use crate::models::{Provider, User};
use crate::services::password::PasswordService;
use crate::services::tokens::{TokenKind, TokenService};

/// A user plus a freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// A federated user plus its provider session token.
#[derive(Debug, Clone)]
pub struct FederatedSession {
    pub user: User,
    pub session_token: String,
}

pub struct AuthGateway {
    store: Arc<dyn TrackerStore>,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
    store_timeout: Duration,
}

impl AuthGateway {
    pub fn new(
        store: Arc<dyn TrackerStore>,
        passwords: PasswordService,
        tokens: Arc<TokenService>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            passwords,
            tokens,
            store_timeout,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        bounded(
            self.store_timeout,
            "find_user_by_email",
            self.store.find_user_by_email(email),
        )
        .await
    }

    fn conflict_for(existing: &User) -> AppError {
        match existing.provider {
            Provider::Federated => AppError::ConflictFederated,
            Provider::Local => AppError::ConflictLocal,
        }
    }

    fn issue_pair(&self, user: User) -> Result<IssuedCredentials> {
        let access_token = self.tokens.issue_access(&user.user_id, &user.email)?;
        let refresh_token = self.tokens.issue_refresh(&user.user_id, &user.email)?;
        Ok(IssuedCredentials {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Create a local account.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<IssuedCredentials> {
        if let Some(existing) = self.find_by_email(email).await? {
            return Err(Self::conflict_for(&existing));
        }

        let password_hash = self.passwords.hash(password).await?;
        let user = User::new_local(name.to_string(), email.to_string(), password_hash);

        let inserted = bounded(self.store_timeout, "insert_user", self.store.insert_user(&user)).await?;
        if !inserted {
            // Lost a race with a concurrent registration or federated sign-in.
            return Err(match self.find_by_email(email).await? {
                Some(existing) => Self::conflict_for(&existing),
                None => AppError::ConflictLocal,
            });
        }

        tracing::info!(user_id = %user.user_id, "Local account registered");
        self.issue_pair(user)
    }

    /// Password login.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedCredentials> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if user.provider == Provider::Federated {
            return Err(AppError::FederatedOnly);
        }

        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AppError::InvalidCredentials);
        };

        if !self.passwords.verify(password, hash).await? {
            tracing::info!(user_id = %user.user_id, "Password login rejected");
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.user_id, "Password login");
        self.issue_pair(user)
    }

    /// Mint a new access token from a refresh token. The refresh token is
    /// returned unchanged to its holder (no rotation).
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AppError::MissingToken)?;

        let claims = self.tokens.verify(token, TokenKind::Refresh).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            AppError::InvalidToken
        })?;

        let user = bounded(
            self.store_timeout,
            "find_user_by_id",
            self.store.find_user_by_id(&claims.sub),
        )
        .await?
        .ok_or(AppError::UserGone)?;

        Ok(self.tokens.issue_access(&user.user_id, &user.email)?)
    }

    /// Record a completed provider handshake.
    ///
    /// Creates the user on first sign-in; an existing record (local or
    /// federated) is left untouched. Always issues a fresh session token.
    pub async fn federated_sign_in(&self, name: &str, email: &str) -> Result<FederatedSession> {
        let candidate = User::new_federated(name.to_string(), email.to_string());
        let user = bounded(
            self.store_timeout,
            "upsert_federated_user",
            self.store.upsert_federated_user(&candidate),
        )
        .await?;

        if user.provider == Provider::Local {
            tracing::warn!(
                user_id = %user.user_id,
                "Federated sign-in for an email registered locally"
            );
        }

        let session_token = self.tokens.issue_session(&user.user_id, &user.email)?;
        Ok(FederatedSession {
            user,
            session_token,
        })
    }
}
