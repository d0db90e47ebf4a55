// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity ledger routes. All require an authenticated user.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{ActivityEntry, Collectible, DayMarker, EntryStatus, QuestionRecord, TrackerSnapshot};
use crate::routes::json_rejection;
use crate::time_utils::DateKey;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracker", get(get_tracker))
        .route("/tracker/entry", post(save_entry).delete(delete_entry))
        .route("/tracker/marker", patch(set_marker))
        .route("/tracker/collectible", post(award_collectible))
}

/// Parse a required `YYYY-MM-DD` field.
fn parse_date(raw: Option<&str>) -> Result<DateKey> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Date is required".to_string()))?;
    raw.parse()
        .map_err(|e: crate::time_utils::DateKeyError| AppError::Validation(e.to_string()))
}

async fn get_tracker(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TrackerSnapshot>> {
    Ok(Json(state.ledger.snapshot(&user.user_id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveEntryRequest {
    pub date: Option<String>,
    pub status: Option<EntryStatus>,
    pub questions: Vec<QuestionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryResponse {
    pub entry: ActivityEntry,
}

async fn save_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<SaveEntryRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>> {
    let Json(payload) = payload.map_err(json_rejection)?;
    let date = parse_date(payload.date.as_deref())?;

    let entry = state
        .ledger
        .save_entry(
            &user.user_id,
            date,
            payload.status.unwrap_or_default(),
            payload.questions,
        )
        .await?;

    Ok(Json(EntryResponse { entry }))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEntryResponse {
    pub success: bool,
    pub date: DateKey,
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DateQuery>,
) -> Result<Json<DeleteEntryResponse>> {
    let date = parse_date(query.date.as_deref())?;
    state.ledger.delete_entry(&user.user_id, date).await?;
    Ok(Json(DeleteEntryResponse {
        success: true,
        date,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MarkerRequest {
    pub date: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkerResponse {
    pub marker: DayMarker,
}

async fn set_marker(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<MarkerRequest>, JsonRejection>,
) -> Result<Json<MarkerResponse>> {
    let Json(payload) = payload.map_err(json_rejection)?;
    let date = parse_date(payload.date.as_deref())?;
    let active = payload
        .active
        .ok_or_else(|| AppError::Validation("active is required".to_string()))?;

    let marker = state
        .ledger
        .set_marker_active(&user.user_id, date, active)
        .await?;
    Ok(Json(MarkerResponse { marker }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectibleRequest {
    pub collectible_id: Option<u32>,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CollectibleResponse {
    pub collectible: Collectible,
}

async fn award_collectible(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<CollectibleRequest>, JsonRejection>,
) -> Result<Json<CollectibleResponse>> {
    let Json(payload) = payload.map_err(json_rejection)?;

    // Missing and zero share the same rejection in the ledger.
    let collectible = state
        .ledger
        .award_collectible(
            &user.user_id,
            payload.collectible_id.unwrap_or(0),
            payload.name,
            payload.image,
        )
        .await?;
    Ok(Json(CollectibleResponse { collectible }))
}
