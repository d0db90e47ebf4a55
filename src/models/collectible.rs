// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Collectible stickers unlocked by streak milestones.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Days of max streak per unlocked sticker.
pub const STREAK_DAYS_PER_MILESTONE: u32 = 10;

/// A sticker the product knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSticker {
    pub id: u32,
    pub name: &'static str,
    pub image: &'static str,
}

/// Built-in sticker catalog.
pub const CATALOG: &[CatalogSticker] = &[
    CatalogSticker { id: 1, name: "Hot Air Balloon", image: "/assets/sticker-1.png" },
    CatalogSticker { id: 2, name: "Keep Shining", image: "/assets/sticker-2.png" },
    CatalogSticker { id: 3, name: "You've Got This", image: "/assets/sticker-3.png" },
    CatalogSticker { id: 4, name: "Dream Big", image: "/assets/sticker-4.png" },
    CatalogSticker { id: 5, name: "Stay Positive", image: "/assets/sticker-5.png" },
    CatalogSticker { id: 6, name: "Great Work", image: "/assets/sticker-6.png" },
    CatalogSticker { id: 7, name: "Grow at Your Own Pace", image: "/assets/sticker-7.png" },
];

/// Look up a catalog sticker by id.
pub fn catalog_entry(id: u32) -> Option<&'static CatalogSticker> {
    CATALOG.iter().find(|s| s.id == id)
}

/// Number of sticker milestones a max streak has reached.
pub fn milestones_reached(max_streak: u32) -> u32 {
    max_streak / STREAK_DAYS_PER_MILESTONE
}

/// An earned sticker, one per (user, collectible id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Collectible {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub user_id: String,
    pub collectible_id: u32,
    pub name: String,
    pub image: String,
    /// First time this sticker was earned (RFC3339)
    pub earned_at: String,
}
