// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Derived per-user records: day markers ("stars") and the streak record.

use serde::{Deserialize, Serialize};

use crate::models::ActivityEntry;
use crate::time_utils::DateKey;

/// Reward record for a completed day, one per (user, date).
///
/// Exists exactly when the entry for `date` has status `done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMarker {
    pub user_id: String,
    pub date: DateKey,
    /// Snapshot of question texts when the day was marked done
    #[serde(default)]
    pub questions: Vec<String>,
    /// Snapshot of language tags
    #[serde(default)]
    pub languages: Vec<String>,
    /// Whether the star is shown in the jar
    pub active: bool,
}

impl DayMarker {
    /// Snapshot an entry into a fresh, active marker.
    pub fn from_entry(entry: &ActivityEntry) -> Self {
        Self {
            user_id: entry.user_id.clone(),
            date: entry.date,
            questions: entry.question_texts(),
            languages: entry.languages.clone(),
            active: true,
        }
    }
}

/// Longest run of consecutive done days, one per user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub user_id: String,
    pub max_streak: u32,
    #[serde(default)]
    pub updated_at: String,
}
