// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes: local register/login/refresh/logout and Google sign-in.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::ClientAddr;
use crate::models::PublicUser;
use crate::routes::{json_rejection, validation_error};
use crate::services::google_signin::{
    new_nonce, sign_state, verify_state, NONCE_COOKIE, STATE_MAX_AGE,
};
use crate::services::identity::{ACCESS_COOKIE, REFRESH_COOKIE, SESSION_COOKIE};
use crate::services::rate_limit::RateLimiter;
use crate::services::tokens::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL, SESSION_TOKEN_TTL};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
}

/// httpOnly, same-site lax, path `/`; `Secure` in production.
fn auth_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

/// Longest accepted password, in bytes. Bounds the hashing work per request.
pub const MAX_PASSWORD_LEN: usize = 128;

fn check_password_len(password: &str) -> Result<()> {
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Rejects empty and whitespace-only values.
fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn check_limit(limiter: &RateLimiter, addr: &ClientAddr) -> Result<()> {
    limiter
        .check(&addr.0)
        .map_err(|retry_after| AppError::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        })
}

// ─── Local accounts ──────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[serde(alias = "user_name")]
    #[validate(custom(function = "not_blank", message = "All fields are required"))]
    pub name: String,
    #[validate(
        length(min = 1, message = "All fields are required"),
        email(message = "Invalid email address")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "All fields are required"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RefreshResponse {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RefreshRequest {
    refresh_token: Option<String>,
}

fn with_token_cookies(jar: CookieJar, secure: bool, access: &str, refresh: &str) -> CookieJar {
    jar.add(auth_cookie(ACCESS_COOKIE, access.to_string(), ACCESS_TOKEN_TTL, secure))
        .add(auth_cookie(REFRESH_COOKIE, refresh.to_string(), REFRESH_TOKEN_TTL, secure))
}

async fn register(
    State(state): State<Arc<AppState>>,
    addr: ClientAddr,
    jar: CookieJar,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<RegisterResponse>)> {
    check_limit(&state.limits.register, &addr)?;
    let Json(payload) = payload.map_err(json_rejection)?;
    payload.validate().map_err(validation_error)?;
    check_password_len(&payload.password)?;

    let issued = state
        .gateway
        .register(payload.name.trim(), &payload.email, &payload.password)
        .await?;

    let jar = with_token_cookies(
        jar,
        state.config.secure_cookies(),
        &issued.access_token,
        &issued.refresh_token,
    );

    Ok((
        StatusCode::CREATED,
        jar,
        Json(RegisterResponse {
            token: issued.access_token,
            refresh_token: issued.refresh_token,
            user: issued.user.public(),
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    addr: ClientAddr,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    check_limit(&state.limits.login, &addr)?;
    let Json(payload) = payload.map_err(json_rejection)?;
    payload.validate().map_err(validation_error)?;
    check_password_len(&payload.password)?;

    let issued = state.gateway.login(&payload.email, &payload.password).await?;

    let jar = with_token_cookies(
        jar,
        state.config.secure_cookies(),
        &issued.access_token,
        &issued.refresh_token,
    );

    Ok((
        jar,
        Json(LoginResponse {
            token: issued.access_token,
            user: issued.user.public(),
        }),
    ))
}

/// Refresh token from `{ refreshToken }` in the body, else the cookie.
async fn refresh(
    State(state): State<Arc<AppState>>,
    addr: ClientAddr,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<RefreshResponse>)> {
    check_limit(&state.limits.refresh, &addr)?;

    let request: RefreshRequest = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| AppError::Validation("Request body must be JSON".to_string()))?
    };

    let token = request
        .refresh_token
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()));

    let access = state.gateway.refresh(token.as_deref()).await?;
    let jar = jar.add(auth_cookie(
        ACCESS_COOKIE,
        access.clone(),
        ACCESS_TOKEN_TTL,
        state.config.secure_cookies(),
    ));

    Ok((jar, Json(RefreshResponse { token: access })))
}

/// Clear every auth cookie with the attributes it was set with.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let secure = state.config.secure_cookies();
    let jar = [ACCESS_COOKIE, REFRESH_COOKIE, SESSION_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| {
            jar.add(auth_cookie(name, String::new(), Duration::ZERO, secure))
        });
    (jar, StatusCode::NO_CONTENT)
}

// ─── Google sign-in ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct GoogleStartParams {
    /// Frontend page to return to. Must be under FRONTEND_URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

async fn google_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<GoogleStartParams>,
) -> Result<(CookieJar, Redirect)> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".to_string()))?;

    let frontend_url = &state.config.frontend_url;
    let return_to = params
        .redirect_uri
        .filter(|uri| uri.starts_with(frontend_url.as_str()))
        .unwrap_or_else(|| frontend_url.clone());

    let nonce = new_nonce();
    let oauth_state = sign_state(
        &return_to,
        &nonce,
        &state.config.oauth_state_key,
        SystemTime::now(),
    )?;
    tracing::info!(return_to = %return_to, "Starting Google sign-in");

    let jar = jar.add(nonce_cookie(nonce, STATE_MAX_AGE, state.config.secure_cookies()));
    Ok((jar, Redirect::temporary(&google.authorize_url(&oauth_state))))
}

/// Scoped to the Google routes; lives as long as the state it binds.
fn nonce_cookie(value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    let mut cookie = auth_cookie(NONCE_COOKIE, value, max_age, secure);
    cookie.set_path("/auth/google");
    cookie
}

/// Redirect to `return_to` with `error=<reason>` appended.
fn error_redirect(return_to: &str, reason: &str) -> Redirect {
    let separator = if return_to.contains('?') { '&' } else { '?' };
    Redirect::temporary(&format!(
        "{}{}error={}",
        return_to,
        separator,
        urlencoding::encode(reason)
    ))
}

#[derive(Deserialize)]
pub struct GoogleCallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<String>,
}

async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<GoogleCallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".to_string()))?;

    // The nonce is single use whatever the outcome.
    let nonce = jar
        .get(NONCE_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();
    let jar = jar.add(nonce_cookie(
        String::new(),
        Duration::ZERO,
        state.config.secure_cookies(),
    ));

    let Some(return_to) = verify_state(
        &params.state,
        &nonce,
        &state.config.oauth_state_key,
        SystemTime::now(),
    ) else {
        tracing::warn!("Rejecting Google callback with invalid OAuth state");
        return Ok((jar, error_redirect(&state.config.frontend_url, "invalid_state")));
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Google returned an OAuth error");
        return Ok((jar, error_redirect(&return_to, &error)));
    }
    let Some(code) = params.code else {
        return Ok((jar, error_redirect(&return_to, "missing_code")));
    };

    let profile = match google.complete(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "Google sign-in failed");
            return Ok((jar, error_redirect(&return_to, "signin_failed")));
        }
    };

    let session = state
        .gateway
        .federated_sign_in(&profile.name, &profile.email)
        .await?;
    tracing::info!(user_id = %session.user.user_id, "Google sign-in complete");

    let jar = jar.add(auth_cookie(
        SESSION_COOKIE,
        session.session_token,
        SESSION_TOKEN_TTL,
        state.config.secure_cookies(),
    ));
    Ok((jar, Redirect::temporary(&return_to)))
}
