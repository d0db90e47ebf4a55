// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Longest run of consecutive completed days.
//!
//! This is the single adjacency implementation: the server-side derived
//! state recompute and the client's optimistic projection both call it.

use crate::time_utils::DateKey;

/// Compute the longest run of calendar-consecutive done days.
///
/// `days` yields `(date, done)` pairs in any order, at most one per date.
/// A run breaks on a day that is not done, and on any gap between two done
/// days that is not exactly one calendar day (a date with no entry at all
/// breaks the run like a not-done day).
pub fn longest_run<I>(days: I) -> u32
where
    I: IntoIterator<Item = (DateKey, bool)>,
{
    let mut days: Vec<(DateKey, bool)> = days.into_iter().collect();
    days.sort_by_key(|(date, _)| *date);

    let mut max = 0u32;
    let mut current = 0u32;
    let mut previous_done: Option<DateKey> = None;

    for (date, done) in days {
        if !done {
            current = 0;
            previous_done = None;
            continue;
        }

        current = match previous_done {
            Some(prev) if prev.is_followed_by(date) => current + 1,
            _ => 1,
        };
        max = max.max(current);
        previous_done = Some(date);
    }

    max
}
