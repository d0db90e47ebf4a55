// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Aggregate tracker view returned by `GET /tracker` and held by clients.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::collectible::milestones_reached;
use crate::models::{ActivityEntry, Collectible, DayMarker};
use crate::streak::longest_run;
use crate::time_utils::DateKey;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub entries: BTreeMap<DateKey, ActivityEntry>,
    pub markers: BTreeMap<DateKey, DayMarker>,
    pub collectibles: Vec<Collectible>,
    pub max_streak: u32,
    pub milestones_reached: u32,
}

impl TrackerSnapshot {
    pub fn new(
        entries: Vec<ActivityEntry>,
        markers: Vec<DayMarker>,
        collectibles: Vec<Collectible>,
        max_streak: u32,
    ) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.date, e)).collect(),
            markers: markers.into_iter().map(|m| (m.date, m)).collect(),
            collectibles,
            max_streak,
            milestones_reached: milestones_reached(max_streak),
        }
    }

    /// Local projection of saving `entry`: same marker rule and run
    /// computation the server applies.
    pub fn apply_save(&mut self, entry: ActivityEntry) {
        let date = entry.date;
        if entry.status.is_done() {
            self.markers.insert(date, DayMarker::from_entry(&entry));
        } else {
            self.markers.remove(&date);
        }
        self.entries.insert(date, entry);
        self.recompute_streak();
    }

    /// Local projection of deleting the entry for `date`.
    pub fn apply_delete(&mut self, date: DateKey) {
        self.entries.remove(&date);
        self.markers.remove(&date);
        self.recompute_streak();
    }

    fn recompute_streak(&mut self) {
        self.max_streak = longest_run(
            self.entries
                .values()
                .map(|e| (e.date, e.status.is_done())),
        );
        self.milestones_reached = milestones_reached(self.max_streak);
    }
}
