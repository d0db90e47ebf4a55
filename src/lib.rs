// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! CodeJar tracker: daily coding-habit log with stars, streaks and stickers.
//!
//! This crate provides the backend API (local and Google accounts, the
//! activity ledger and its derived state) plus a Rust client with an
//! optimistic projection cache.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod streak;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::TrackerStore;
use services::{
    AuthGateway, GoogleSignIn, IdentityResolver, LedgerService, PasswordService, RateLimiter,
    SessionOracle, SignedSessionOracle, TokenService,
};

/// Per-route attempt limiters.
pub struct RateLimits {
    pub register: RateLimiter,
    pub login: RateLimiter,
    pub refresh: RateLimiter,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            register: RateLimiter::register(),
            login: RateLimiter::login(),
            refresh: RateLimiter::refresh(),
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TrackerStore>,
    pub tokens: Arc<TokenService>,
    pub resolver: IdentityResolver,
    pub gateway: AuthGateway,
    pub ledger: LedgerService,
    pub limits: RateLimits,
    /// Present when Google OAuth credentials are configured
    pub google: Option<GoogleSignIn>,
}

impl AppState {
    /// Wire services over `store` with the signed-cookie session oracle.
    pub fn new(config: Config, store: Arc<dyn TrackerStore>) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenService::new(&config));
        let oracle = Arc::new(SignedSessionOracle::new(tokens.clone()));
        Self::with_session_oracle(config, store, tokens, oracle)
    }

    /// Wire services with a caller-supplied session oracle. `tokens` is
    /// shared by the resolver, the gateway and the oracle if it needs one.
    pub fn with_session_oracle(
        config: Config,
        store: Arc<dyn TrackerStore>,
        tokens: Arc<TokenService>,
        oracle: Arc<dyn SessionOracle>,
    ) -> anyhow::Result<Self> {
        let passwords = PasswordService::new(config.password_cost)?;
        let timeout = config.store_timeout;

        let google = config
            .google
            .clone()
            .map(|oauth| GoogleSignIn::new(oauth, &config.api_url))
            .transpose()?;

        Ok(Self {
            resolver: IdentityResolver::new(tokens.clone(), oracle, store.clone(), timeout),
            gateway: AuthGateway::new(store.clone(), passwords, tokens.clone(), timeout),
            ledger: LedgerService::new(store.clone(), timeout),
            limits: RateLimits::default(),
            google,
            tokens,
            store,
            config,
        })
    }
}
