// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the `TrackerStore` contract and its backends.
//!
//! The store is constructed once in `main`, injected through `AppState`, and
//! shut down explicitly after the server stops. Uniqueness (email; user+date;
//! user+collectible) is enforced by the backend keys, which is the only
//! concurrency safeguard the services rely on.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{ActivityEntry, Collectible, DayMarker, StreakRecord, User};
use crate::time_utils::DateKey;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email -> user_id index (document ID is the url-encoded email)
    pub const USER_EMAILS: &str = "user_emails";
    pub const ENTRIES: &str = "daily_entries";
    pub const MARKERS: &str = "day_markers";
    /// Streak records (keyed by user_id)
    pub const STREAKS: &str = "streaks";
    pub const COLLECTIBLES: &str = "collectibles";
}

/// Write to the entry document of a ledger commit.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOp {
    Upsert(ActivityEntry),
    Delete(DateKey),
}

/// Write to the marker document of a ledger commit.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerOp {
    Upsert(DayMarker),
    Remove(DateKey),
}

/// An entry write plus the derived state it produces, applied as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommit {
    pub user_id: String,
    pub entry: EntryOp,
    pub marker: MarkerOp,
    pub streak: StreakRecord,
}

/// Document store contract required by the core.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError>;
    /// Insert a new user. Returns `false` (and writes nothing) if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<bool, AppError>;
    /// Insert `candidate` unless a user with its email exists; return the stored user.
    /// Existing records are never modified.
    async fn upsert_federated_user(&self, candidate: &User) -> Result<User, AppError>;

    // ─── Activity ledger ─────────────────────────────────────────
    async fn list_entries(&self, user_id: &str) -> Result<Vec<ActivityEntry>, AppError>;
    /// Apply entry, marker and streak writes together.
    async fn commit_ledger(&self, commit: &LedgerCommit) -> Result<(), AppError>;
    async fn list_markers(&self, user_id: &str) -> Result<Vec<DayMarker>, AppError>;
    /// Update the `active` flag of an existing marker. `None` if there is no marker.
    async fn set_marker_active(
        &self,
        user_id: &str,
        date: DateKey,
        active: bool,
    ) -> Result<Option<DayMarker>, AppError>;
    async fn get_streak(&self, user_id: &str) -> Result<Option<StreakRecord>, AppError>;

    // ─── Collectibles ────────────────────────────────────────────
    /// Insert unless (user, collectible id) exists; return the stored record.
    async fn insert_collectible_if_absent(
        &self,
        collectible: &Collectible,
    ) -> Result<Collectible, AppError>;
    async fn list_collectibles(&self, user_id: &str) -> Result<Vec<Collectible>, AppError>;

    // ─── Lifecycle ───────────────────────────────────────────────
    async fn shutdown(&self);
}

/// Document ID for per-(user, date) collections.
pub fn day_doc_id(user_id: &str, date: DateKey) -> String {
    format!("{}_{}", user_id, date)
}

/// Bound a store operation. Elapsed time becomes a transient `Unavailable`.
pub async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Store operation timed out"
            );
            Err(AppError::Unavailable(format!("{operation} timed out")))
        }
    }
}
