// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rust client for the tracker API.
//!
//! [`HttpTrackerClient`] talks to the server with bearer tokens and
//! refreshes them on 401. [`ProjectionCache`] sits on top of any
//! [`TrackerApi`] and keeps an optimistic local copy of the aggregate view.

pub mod api;
pub mod projection;

pub use api::{EntryDraft, HttpTrackerClient, TrackerApi};
pub use projection::{ProjectionCache, FRESHNESS_WINDOW};

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Refresh failed (or there was no identity); the user must sign in again.
    #[error("Session expired, sign in again")]
    SessionExpired,

    /// The server answered with an error body.
    #[error("{status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
