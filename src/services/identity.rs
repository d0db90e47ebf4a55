// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity resolution across federated sessions and local tokens.
//!
//! A request may carry up to three credentials. They are tried in a fixed
//! order and the first one that names an existing user wins:
//!
//! 1. the federated session cookie, read through a [`SessionOracle`]
//! 2. the `token` access cookie
//! 3. an `Authorization: Bearer` access token
//!
//! Callers only ever see [`AuthUser`]; how the user authenticated is hidden
//! apart from the provider tag.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{bounded, TrackerStore};
use crate::error::AppError;
use crate::models::Provider;
use crate::services::tokens::{TokenClaims, TokenKind, TokenService};

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const SESSION_COOKIE: &str = "session";

/// Authenticated user attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub provider: Provider,
}

/// A credential that verified, before the user record is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Federated { email: String },
    Local { claims: TokenClaims },
}

impl Identity {
    fn email(&self) -> &str {
        match self {
            Identity::Federated { email } => email,
            Identity::Local { claims } => &claims.email,
        }
    }

    fn provider(&self) -> Provider {
        match self {
            Identity::Federated { .. } => Provider::Federated,
            Identity::Local { .. } => Provider::Local,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("session cookie rejected: {0}")]
    Rejected(String),
    #[error("session backend unavailable: {0}")]
    Unavailable(String),
}

/// Reads the federated provider session attached to a request.
#[async_trait]
pub trait SessionOracle: Send + Sync {
    /// Principal email of the session, `None` when there is no session.
    async fn session_email(&self, jar: &CookieJar) -> Result<Option<String>, OracleError>;
}

/// Session oracle backed by the signed `session` cookie issued on Google sign-in.
pub struct SignedSessionOracle {
    tokens: Arc<TokenService>,
}

impl SignedSessionOracle {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl SessionOracle for SignedSessionOracle {
    async fn session_email(&self, jar: &CookieJar) -> Result<Option<String>, OracleError> {
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(None);
        };
        self.tokens
            .verify(cookie.value(), TokenKind::Session)
            .map(|claims| Some(claims.email))
            .map_err(|e| OracleError::Rejected(e.to_string()))
    }
}

/// Where a credential is read from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    FederatedSession,
    AccessCookie,
    BearerHeader,
}

pub const RESOLUTION_ORDER: [CredentialSource; 3] = [
    CredentialSource::FederatedSession,
    CredentialSource::AccessCookie,
    CredentialSource::BearerHeader,
];

pub struct IdentityResolver {
    tokens: Arc<TokenService>,
    oracle: Arc<dyn SessionOracle>,
    store: Arc<dyn TrackerStore>,
    store_timeout: Duration,
}

impl IdentityResolver {
    pub fn new(
        tokens: Arc<TokenService>,
        oracle: Arc<dyn SessionOracle>,
        store: Arc<dyn TrackerStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            oracle,
            store,
            store_timeout,
        }
    }

    /// Resolve the caller.
    ///
    /// `Unauthorized` when no source yields an existing user. Store failures
    /// and timeouts propagate as-is so they are never mistaken for a
    /// missing login.
    pub async fn resolve(&self, headers: &HeaderMap, jar: &CookieJar) -> Result<AuthUser, AppError> {
        for source in RESOLUTION_ORDER {
            let Some(identity) = self.identity_from(source, headers, jar).await else {
                continue;
            };

            let user = bounded(
                self.store_timeout,
                "find_user_by_email",
                self.store.find_user_by_email(identity.email()),
            )
            .await?;

            match user {
                Some(user) => {
                    return Ok(AuthUser {
                        user_id: user.user_id,
                        email: user.email,
                        provider: identity.provider(),
                    });
                }
                None => {
                    tracing::debug!(?source, "Credential verified but user does not exist");
                }
            }
        }

        Err(AppError::Unauthorized)
    }

    async fn identity_from(
        &self,
        source: CredentialSource,
        headers: &HeaderMap,
        jar: &CookieJar,
    ) -> Option<Identity> {
        match source {
            CredentialSource::FederatedSession => match self.oracle.session_email(jar).await {
                Ok(email) => email.map(|email| Identity::Federated { email }),
                Err(e) => {
                    tracing::debug!(error = %e, "Session oracle failed");
                    None
                }
            },
            CredentialSource::AccessCookie => {
                let cookie = jar.get(ACCESS_COOKIE)?;
                self.verify_access(cookie.value(), source)
            }
            CredentialSource::BearerHeader => {
                let token = bearer_token(headers)?;
                self.verify_access(token, source)
            }
        }
    }

    fn verify_access(&self, token: &str, source: CredentialSource) -> Option<Identity> {
        match self.tokens.verify(token, TokenKind::Access) {
            Ok(claims) => Some(Identity::Local { claims }),
            Err(e) => {
                tracing::debug!(?source, error = %e, "Access token rejected");
                None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}
