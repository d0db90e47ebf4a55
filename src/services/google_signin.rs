// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authorization-code flow.
//!
//! `GET /auth/google` sends the browser to Google with a signed `state`
//! naming where to land afterwards, and drops a nonce cookie that the state
//! is bound to. The callback only proceeds when the state verifies and its
//! nonce matches the cookie the same browser presents; it then exchanges
//! the code for an ID token and verifies it.

use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::config::GoogleOAuthConfig;
use crate::services::google_oidc::{GoogleOidcVerifier, GoogleProfile, OidcError};

type HmacSha256 = Hmac<Sha256>;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a signed `state` stays acceptable.
pub const STATE_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Cookie carrying the browser's half of the `state` binding.
pub const NONCE_COOKIE: &str = "oauthNonce";

/// Fresh per-sign-in nonce (hex, never contains `|`).
pub fn new_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Sign `nonce` and `return_to` into an opaque `state` value issued at `now`.
///
/// Layout before base64url: `nonce|return_to|issued_ms_hex|hmac_hex`.
pub fn sign_state(
    return_to: &str,
    nonce: &str,
    key: &[u8],
    now: SystemTime,
) -> anyhow::Result<String> {
    anyhow::ensure!(
        !nonce.is_empty() && !nonce.contains('|'),
        "OAuth nonce must be non-empty and free of '|'"
    );
    let issued_ms = now.duration_since(UNIX_EPOCH)?.as_millis();
    let payload = format!("{}|{}|{:x}", nonce, return_to, issued_ms);

    let mut mac = HmacSha256::new_from_slice(key).context("HMAC init failed")?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify a `state` produced by [`sign_state`] against the nonce the
/// browser presented, and return its `return_to`.
///
/// `None` if it is malformed, tampered with, older than [`STATE_MAX_AGE`],
/// or bound to a different nonce.
pub fn verify_state(state: &str, nonce: &str, key: &[u8], now: SystemTime) -> Option<String> {
    let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(state).ok()?).ok()?;

    // return_to may itself contain '|', so split the tail from the right.
    let mut parts = decoded.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let issued_hex = parts.next()?;
    let bound = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(format!("{}|{}", bound, issued_hex).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    let (state_nonce, return_to) = bound.split_once('|')?;
    if nonce.is_empty() || !bool::from(state_nonce.as_bytes().ct_eq(nonce.as_bytes())) {
        tracing::warn!("OAuth state not bound to this browser");
        return None;
    }

    let issued = UNIX_EPOCH + Duration::from_millis(u64::from_str_radix(issued_hex, 16).ok()?);
    let age = now.duration_since(issued).unwrap_or_default();
    if age > STATE_MAX_AGE {
        tracing::info!(age_secs = age.as_secs(), "OAuth state expired");
        return None;
    }

    Some(return_to.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error("code exchange failed: {0}")]
    Exchange(String),
    #[error(transparent)]
    IdToken(#[from] OidcError),
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
}

/// OAuth client for Google sign-in.
pub struct GoogleSignIn {
    oauth: GoogleOAuthConfig,
    redirect_uri: String,
    http_client: reqwest::Client,
    verifier: GoogleOidcVerifier,
}

impl GoogleSignIn {
    /// `api_url` is this service's public base URL.
    pub fn new(oauth: GoogleOAuthConfig, api_url: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building Google sign-in HTTP client")?;
        let verifier = GoogleOidcVerifier::new(oauth.client_id.clone())?;

        Ok(Self {
            redirect_uri: format!("{}/auth/google/callback", api_url.trim_end_matches('/')),
            oauth,
            http_client,
            verifier,
        })
    }

    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode("openid email profile"),
            state
        )
    }

    /// Exchange an authorization code and verify the resulting ID token.
    pub async fn complete(&self, code: &str) -> Result<GoogleProfile, SignInError> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| SignInError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SignInError::Exchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| SignInError::Exchange(format!("invalid token response: {e}")))?;

        Ok(self.verifier.verify(&tokens.id_token).await?)
    }
}
