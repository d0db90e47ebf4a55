// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-held projection of the server's aggregate view.
//!
//! The cache keeps the last confirmed snapshot plus the writes still in
//! flight. The visible view is the confirmed snapshot with every pending
//! write replayed in issue order, using the same marker rule and run
//! computation as the server. A failed write is dropped from the pending
//! list, so only its own effect disappears; a successful one is folded into
//! the confirmed snapshot and followed by a reload so the server's
//! recompute replaces the local approximation.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::client::api::{EntryDraft, TrackerApi};
use crate::client::ClientError;
use crate::models::{ActivityEntry, Collectible, TrackerSnapshot};
use crate::time_utils::DateKey;

/// `load_all` serves the cached snapshot for this long after a fetch.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
enum PendingWrite {
    Save(ActivityEntry),
    Delete(DateKey),
}

impl PendingWrite {
    fn apply(&self, snapshot: &mut TrackerSnapshot) {
        match self {
            PendingWrite::Save(entry) => snapshot.apply_save(entry.clone()),
            PendingWrite::Delete(date) => snapshot.apply_delete(*date),
        }
    }
}

#[derive(Default)]
struct CacheState {
    /// Last server snapshot plus writes the server acknowledged since.
    confirmed: TrackerSnapshot,
    pending: Vec<(u64, PendingWrite)>,
    next_write_id: u64,
    /// `confirmed` with `pending` replayed on top.
    view: TrackerSnapshot,
    fetched_at: Option<Instant>,
}

impl CacheState {
    fn rebuild_view(&mut self) {
        let mut view = self.confirmed.clone();
        for (_, write) in &self.pending {
            write.apply(&mut view);
        }
        self.view = view;
    }

    fn begin(&mut self, write: PendingWrite) -> u64 {
        let id = self.next_write_id;
        self.next_write_id += 1;
        write.apply(&mut self.view);
        self.pending.push((id, write));
        id
    }

    /// Retire write `id`. Acknowledged writes move into `confirmed`;
    /// failed ones vanish and the cache is marked stale.
    fn settle(&mut self, id: u64, acknowledged: bool) {
        let Some(pos) = self.pending.iter().position(|(pending, _)| *pending == id) else {
            return;
        };
        let (_, write) = self.pending.remove(pos);
        if acknowledged {
            write.apply(&mut self.confirmed);
        } else {
            self.fetched_at = None;
        }
        self.rebuild_view();
    }
}

pub struct ProjectionCache<A> {
    api: A,
    state: Mutex<CacheState>,
}

impl<A: TrackerApi> ProjectionCache<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Current local view, including any in-flight optimistic changes.
    pub async fn snapshot(&self) -> TrackerSnapshot {
        self.state.lock().await.view.clone()
    }

    /// Fetch unless the last fetch is inside [`FRESHNESS_WINDOW`].
    pub async fn load_all(&self) -> Result<TrackerSnapshot, ClientError> {
        {
            let state = self.state.lock().await;
            if let Some(at) = state.fetched_at {
                if at.elapsed() < FRESHNESS_WINDOW {
                    return Ok(state.view.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Fetch unconditionally. Writes still in flight stay projected on top.
    pub async fn refresh(&self) -> Result<TrackerSnapshot, ClientError> {
        let snapshot = self.api.fetch_snapshot().await?;
        let mut state = self.state.lock().await;
        state.confirmed = snapshot;
        state.fetched_at = Some(Instant::now());
        state.rebuild_view();
        Ok(state.view.clone())
    }

    /// Make the next `load_all` fetch.
    pub async fn invalidate(&self) {
        self.state.lock().await.fetched_at = None;
    }

    pub async fn save_entry(&self, draft: EntryDraft) -> Result<ActivityEntry, ClientError> {
        let id = {
            let mut state = self.state.lock().await;
            let user_id = state
                .view
                .entries
                .values()
                .next()
                .map(|e| e.user_id.clone())
                .unwrap_or_default();
            state.begin(PendingWrite::Save(draft.to_entry(&user_id)))
        };

        let result = self.api.save_entry(&draft).await;
        self.state.lock().await.settle(id, result.is_ok());
        match result {
            Ok(entry) => {
                self.reload_after_write().await;
                Ok(entry)
            }
            Err(e) => {
                tracing::warn!(date = %draft.date, error = %e, "Save failed, rolled back");
                Err(e)
            }
        }
    }

    pub async fn delete_entry(&self, date: DateKey) -> Result<(), ClientError> {
        let id = self
            .state
            .lock()
            .await
            .begin(PendingWrite::Delete(date));

        let result = self.api.delete_entry(date).await;
        self.state.lock().await.settle(id, result.is_ok());
        match result {
            Ok(()) => {
                self.reload_after_write().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "Delete failed, rolled back");
                Err(e)
            }
        }
    }

    /// No optimistic step; the award is written, then the view reloaded.
    pub async fn award_collectible(
        &self,
        collectible_id: u32,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<Collectible, ClientError> {
        let collectible = self
            .api
            .award_collectible(collectible_id, name, image)
            .await?;
        self.reload_after_write().await;
        Ok(collectible)
    }

    /// The write already succeeded, so a failed reload only marks the
    /// cache stale.
    async fn reload_after_write(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Reload after write failed");
            self.invalidate().await;
        }
    }
}
