// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity ledger writes and the aggregate read.
//!
//! Every entry write re-reads the user's full ledger, plans the derived
//! writes, and commits all three documents as one unit before returning.
//! A failed commit reruns the whole read-plan-commit cycle.

use std::sync::Arc;
use std::time::Duration;

use crate::db::{bounded, EntryOp, LedgerCommit, TrackerStore};
use crate::error::{AppError, Result};
use crate::models::collectible::catalog_entry;
use crate::models::{
    ActivityEntry, Collectible, DayMarker, EntryStatus, QuestionRecord, TrackerSnapshot,
};
use crate::services::derived::plan_commit;
use crate::time_utils::{now_rfc3339, DateKey};

/// Attempts per entry write before the request fails.
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;

pub struct LedgerService {
    store: Arc<dyn TrackerStore>,
    store_timeout: Duration,
}

impl LedgerService {
    pub fn new(store: Arc<dyn TrackerStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Replace the entry for `date` wholesale and recompute derived state.
    pub async fn save_entry(
        &self,
        user_id: &str,
        date: DateKey,
        status: EntryStatus,
        questions: Vec<QuestionRecord>,
    ) -> Result<ActivityEntry> {
        let entry = ActivityEntry::new(user_id, date, status, questions);
        self.apply(user_id, EntryOp::Upsert(entry.clone())).await?;
        tracing::info!(user_id, date = %date, status = %status, "Entry saved");
        Ok(entry)
    }

    /// Remove the entry for `date` (absent is fine) and recompute derived state.
    pub async fn delete_entry(&self, user_id: &str, date: DateKey) -> Result<()> {
        self.apply(user_id, EntryOp::Delete(date)).await?;
        tracing::info!(user_id, date = %date, "Entry deleted");
        Ok(())
    }

    async fn apply(&self, user_id: &str, change: EntryOp) -> Result<LedgerCommit> {
        let mut attempt = 1;
        loop {
            let current = bounded(
                self.store_timeout,
                "list_entries",
                self.store.list_entries(user_id),
            )
            .await?;
            let commit = plan_commit(user_id, &current, change.clone());

            match bounded(
                self.store_timeout,
                "commit_ledger",
                self.store.commit_ledger(&commit),
            )
            .await
            {
                Ok(()) => {
                    tracing::debug!(
                        user_id,
                        max_streak = commit.streak.max_streak,
                        attempt,
                        "Ledger committed"
                    );
                    return Ok(commit);
                }
                Err(e) if e.is_transient() && attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(user_id, attempt, error = %e, "Ledger commit failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Show or hide an existing marker. Never creates or removes one.
    pub async fn set_marker_active(
        &self,
        user_id: &str,
        date: DateKey,
        active: bool,
    ) -> Result<DayMarker> {
        bounded(
            self.store_timeout,
            "set_marker_active",
            self.store.set_marker_active(user_id, date, active),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No star for {date}")))
    }

    /// Record a sticker as earned. Re-earning returns the original record.
    ///
    /// `name`/`image` default to the built-in catalog.
    pub async fn award_collectible(
        &self,
        user_id: &str,
        collectible_id: u32,
        name: Option<String>,
        image: Option<String>,
    ) -> Result<Collectible> {
        if collectible_id == 0 {
            return Err(AppError::Validation("Sticker ID is required".to_string()));
        }

        let catalog = catalog_entry(collectible_id);
        let name = name
            .or_else(|| catalog.map(|s| s.name.to_string()))
            .unwrap_or_default();
        let image = image
            .or_else(|| catalog.map(|s| s.image.to_string()))
            .unwrap_or_default();

        let candidate = Collectible {
            user_id: user_id.to_string(),
            collectible_id,
            name,
            image,
            earned_at: now_rfc3339(),
        };

        let stored = bounded(
            self.store_timeout,
            "insert_collectible_if_absent",
            self.store.insert_collectible_if_absent(&candidate),
        )
        .await?;

        tracing::info!(user_id, collectible_id, "Collectible awarded");
        Ok(stored)
    }

    /// Everything the client renders, in one read.
    pub async fn snapshot(&self, user_id: &str) -> Result<TrackerSnapshot> {
        let (entries, markers, collectibles, streak) = tokio::try_join!(
            bounded(self.store_timeout, "list_entries", self.store.list_entries(user_id)),
            bounded(self.store_timeout, "list_markers", self.store.list_markers(user_id)),
            bounded(
                self.store_timeout,
                "list_collectibles",
                self.store.list_collectibles(user_id)
            ),
            bounded(self.store_timeout, "get_streak", self.store.get_streak(user_id)),
        )?;

        let max_streak = streak.map(|s| s.max_streak).unwrap_or(0);
        Ok(TrackerSnapshot::new(entries, markers, collectibles, max_streak))
    }
}
