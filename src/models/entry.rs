// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Daily activity entry model for storage and API.

use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::time_utils::DateKey;

/// Completion status of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Done,
    #[default]
    Planned,
    NotDone,
}

impl EntryStatus {
    pub fn is_done(self) -> bool {
        self == EntryStatus::Done
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Done => f.write_str("done"),
            EntryStatus::Planned => f.write_str("planned"),
            EntryStatus::NotDone => f.write_str("not-done"),
        }
    }
}

/// One solved (or planned) question and the languages used for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct QuestionRecord {
    pub text: String,
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Activity entry stored in Firestore, one per (user, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Owner
    pub user_id: String,
    /// Calendar day
    pub date: DateKey,
    pub status: EntryStatus,
    /// Questions in the order submitted
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
    /// Flattened language tags across `questions` (first-seen order, no duplicates)
    #[serde(default)]
    pub languages: Vec<String>,
    /// Last write (RFC3339)
    #[serde(default)]
    pub updated_at: String,
}

impl ActivityEntry {
    /// Build an entry from a save request. The language set is derived from
    /// `questions` only; nothing is merged from any previous entry.
    pub fn new(
        user_id: &str,
        date: DateKey,
        status: EntryStatus,
        questions: Vec<QuestionRecord>,
    ) -> Self {
        let questions: Vec<QuestionRecord> = questions
            .into_iter()
            .map(|q| QuestionRecord {
                text: q.text,
                languages: dedup_preserving_order(q.languages),
            })
            .collect();
        let languages = flatten_languages(&questions);

        Self {
            user_id: user_id.to_string(),
            date,
            status,
            questions,
            languages,
            updated_at: crate::time_utils::now_rfc3339(),
        }
    }

    /// Question texts, in order.
    pub fn question_texts(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.text.clone()).collect()
    }
}

/// Union of all language tags across questions, first-seen order.
pub fn flatten_languages(questions: &[QuestionRecord]) -> Vec<String> {
    dedup_preserving_order(
        questions
            .iter()
            .flat_map(|q| q.languages.iter().cloned())
            .collect(),
    )
}

fn dedup_preserving_order(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
