// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication middleware for tracker and profile routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::error::AppError;
use crate::AppState;

pub use crate::services::identity::AuthUser;

/// Resolve the caller and attach [`AuthUser`] to the request, or reject
/// with 401 (503 if the user store is unreachable).
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = state.resolver.resolve(request.headers(), &jar).await?;
    tracing::debug!(user_id = %user.user_id, provider = %user.provider, "Request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
