// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! All collections live behind one `RwLock`, so a ledger commit is applied
//! atomically. Commit failures and per-operation latency can be injected to
//! exercise retry and timeout paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::db::{EntryOp, LedgerCommit, MarkerOp, TrackerStore};
use crate::error::AppError;
use crate::models::{ActivityEntry, Collectible, DayMarker, StreakRecord, User};
use crate::time_utils::DateKey;

type DayKey = (String, DateKey);

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    /// email -> user_id
    emails: HashMap<String, String>,
    entries: HashMap<DayKey, ActivityEntry>,
    markers: HashMap<DayKey, DayMarker>,
    streaks: HashMap<String, StreakRecord>,
    collectibles: HashMap<(String, u32), Collectible>,
}

/// In-memory `TrackerStore`.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    failing_commits: AtomicU32,
    latency_ms: AtomicU64,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` ledger commits fail without writing anything.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn enter(&self) -> Result<(), AppError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Database("store is shut down".to_string()));
        }
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        Ok(())
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TrackerStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.enter().await?;
        let collections = self.collections.read().await;
        Ok(collections
            .emails
            .get(email)
            .and_then(|id| collections.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.enter().await?;
        Ok(self.collections.read().await.users.get(user_id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<bool, AppError> {
        self.enter().await?;
        let mut collections = self.collections.write().await;
        if collections.emails.contains_key(&user.email) {
            return Ok(false);
        }
        collections
            .emails
            .insert(user.email.clone(), user.user_id.clone());
        collections
            .users
            .insert(user.user_id.clone(), user.clone());
        Ok(true)
    }

    async fn upsert_federated_user(&self, candidate: &User) -> Result<User, AppError> {
        self.enter().await?;
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections
            .emails
            .get(&candidate.email)
            .and_then(|id| collections.users.get(id))
        {
            return Ok(existing.clone());
        }
        collections
            .emails
            .insert(candidate.email.clone(), candidate.user_id.clone());
        collections
            .users
            .insert(candidate.user_id.clone(), candidate.clone());
        Ok(candidate.clone())
    }

    async fn list_entries(&self, user_id: &str) -> Result<Vec<ActivityEntry>, AppError> {
        self.enter().await?;
        let collections = self.collections.read().await;
        let mut entries: Vec<ActivityEntry> = collections
            .entries
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    async fn commit_ledger(&self, commit: &LedgerCommit) -> Result<(), AppError> {
        self.enter().await?;
        if self.take_commit_failure() {
            return Err(AppError::Database("injected commit failure".to_string()));
        }

        let mut collections = self.collections.write().await;
        let user_id = commit.user_id.clone();

        match &commit.entry {
            EntryOp::Upsert(entry) => {
                collections
                    .entries
                    .insert((user_id.clone(), entry.date), entry.clone());
            }
            EntryOp::Delete(date) => {
                collections.entries.remove(&(user_id.clone(), *date));
            }
        }

        match &commit.marker {
            MarkerOp::Upsert(marker) => {
                collections
                    .markers
                    .insert((user_id.clone(), marker.date), marker.clone());
            }
            MarkerOp::Remove(date) => {
                collections.markers.remove(&(user_id.clone(), *date));
            }
        }

        collections.streaks.insert(user_id, commit.streak.clone());
        Ok(())
    }

    async fn list_markers(&self, user_id: &str) -> Result<Vec<DayMarker>, AppError> {
        self.enter().await?;
        let collections = self.collections.read().await;
        let mut markers: Vec<DayMarker> = collections
            .markers
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        markers.sort_by_key(|m| m.date);
        Ok(markers)
    }

    async fn set_marker_active(
        &self,
        user_id: &str,
        date: DateKey,
        active: bool,
    ) -> Result<Option<DayMarker>, AppError> {
        self.enter().await?;
        let mut collections = self.collections.write().await;
        Ok(collections
            .markers
            .get_mut(&(user_id.to_string(), date))
            .map(|marker| {
                marker.active = active;
                marker.clone()
            }))
    }

    async fn get_streak(&self, user_id: &str) -> Result<Option<StreakRecord>, AppError> {
        self.enter().await?;
        Ok(self.collections.read().await.streaks.get(user_id).cloned())
    }

    async fn insert_collectible_if_absent(
        &self,
        collectible: &Collectible,
    ) -> Result<Collectible, AppError> {
        self.enter().await?;
        let mut collections = self.collections.write().await;
        let stored = collections
            .collectibles
            .entry((collectible.user_id.clone(), collectible.collectible_id))
            .or_insert_with(|| collectible.clone());
        Ok(stored.clone())
    }

    async fn list_collectibles(&self, user_id: &str) -> Result<Vec<Collectible>, AppError> {
        self.enter().await?;
        let collections = self.collections.read().await;
        let mut collectibles: Vec<Collectible> = collections
            .collectibles
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        collectibles.sort_by_key(|c| c.collectible_id);
        Ok(collectibles)
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!("In-memory store shut down");
    }
}
