// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived-state engine: day markers and the streak record.
//!
//! Both are pure functions of the ledger. Given the entries as stored and
//! the pending change, [`plan_commit`] produces the complete write set so
//! the store can apply entry, marker and streak together.

use std::collections::BTreeMap;

use crate::db::{EntryOp, LedgerCommit, MarkerOp};
use crate::models::{ActivityEntry, DayMarker, StreakRecord};
use crate::streak::longest_run;
use crate::time_utils::{now_rfc3339, DateKey};

/// Marker write implied by an entry write.
pub fn marker_for(change: &EntryOp) -> MarkerOp {
    match change {
        EntryOp::Upsert(entry) if entry.status.is_done() => {
            MarkerOp::Upsert(DayMarker::from_entry(entry))
        }
        EntryOp::Upsert(entry) => MarkerOp::Remove(entry.date),
        EntryOp::Delete(date) => MarkerOp::Remove(*date),
    }
}

/// Longest run over `current` with `change` applied.
pub fn max_streak_after(current: &[ActivityEntry], change: &EntryOp) -> u32 {
    let mut done_by_date: BTreeMap<DateKey, bool> = current
        .iter()
        .map(|e| (e.date, e.status.is_done()))
        .collect();

    match change {
        EntryOp::Upsert(entry) => {
            done_by_date.insert(entry.date, entry.status.is_done());
        }
        EntryOp::Delete(date) => {
            done_by_date.remove(date);
        }
    }

    longest_run(done_by_date)
}

/// Full write set for `change` against the user's current ledger.
///
/// The streak is overwritten with the recomputed value, so it can go down
/// when the day that produced the previous maximum is edited or deleted.
pub fn plan_commit(user_id: &str, current: &[ActivityEntry], change: EntryOp) -> LedgerCommit {
    let marker = marker_for(&change);
    let max_streak = max_streak_after(current, &change);

    LedgerCommit {
        user_id: user_id.to_string(),
        entry: change,
        marker,
        streak: StreakRecord {
            user_id: user_id.to_string(),
            max_streak,
            updated_at: now_rfc3339(),
        },
    }
}
