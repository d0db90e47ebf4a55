// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile route.

use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::bounded;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::Provider;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/user/profile", get(get_profile))
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub provider: Provider,
    pub created_at: String,
}

/// Look the caller up by their resolved email.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let record = bounded(
        state.config.store_timeout,
        "find_user_by_email",
        state.store.find_user_by_email(&user.email),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ProfileResponse {
        id: record.user_id,
        name: record.user_name,
        email: record.email,
        provider: record.provider,
        created_at: record.created_at,
    }))
}
