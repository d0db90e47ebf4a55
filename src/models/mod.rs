// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod collectible;
pub mod entry;
pub mod marker;
pub mod snapshot;
pub mod user;

pub use collectible::Collectible;
pub use entry::{ActivityEntry, EntryStatus, QuestionRecord};
pub use marker::{DayMarker, StreakRecord};
pub use snapshot::TrackerSnapshot;
pub use user::{Provider, PublicUser, User};
