// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Verification of Google sign-in ID tokens against Google's JWKS.

use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Principal from a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub subject: String,
    pub email: String,
    /// Display name, falling back to the email's local part
    pub name: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// Token is invalid or its claims are unacceptable.
    #[error("ID token rejected: {0}")]
    Rejected(String),
    /// Key fetch failed; retrying later may succeed.
    #[error("ID token verification unavailable: {0}")]
    Transient(String),
}

enum KeySource {
    Jwks {
        http_client: reqwest::Client,
        cache: RwLock<Option<KeyCache>>,
        refresh_lock: Mutex<()>,
    },
    Static {
        kid: String,
        key: Arc<DecodingKey>,
    },
}

struct KeyCache {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifies RS256 ID tokens issued to our OAuth client.
pub struct GoogleOidcVerifier {
    client_id: String,
    keys: KeySource,
}

impl GoogleOidcVerifier {
    /// Verifier that fetches and caches Google's signing keys.
    pub fn new(client_id: impl Into<String>) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        Ok(Self {
            client_id: client_id.into(),
            keys: KeySource::Jwks {
                http_client,
                cache: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            },
        })
    }

    /// Verifier with one fixed RSA key, for tests.
    pub fn with_static_key(
        client_id: impl Into<String>,
        kid: impl Into<String>,
        key: DecodingKey,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            keys: KeySource::Static {
                kid: kid.into(),
                key: Arc::new(key),
            },
        }
    }

    pub async fn verify(&self, id_token: &str) -> Result<GoogleProfile, OidcError> {
        let header = decode_header(id_token)
            .map_err(|e| OidcError::Rejected(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Rejected("missing JWT kid".to_string()))?;

        let key = self.key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(id_token, key.as_ref(), &validation)
            .map_err(|e| OidcError::Rejected(format!("JWT validation failed: {e}")))?
            .claims;

        let email = claims
            .email
            .ok_or_else(|| OidcError::Rejected("missing email claim".to_string()))?;
        if claims.email_verified != Some(true) {
            return Err(OidcError::Rejected("email is not verified".to_string()));
        }

        let name = claims
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(GoogleProfile {
            subject: claims.sub,
            email,
            name,
        })
    }

    async fn key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        let (http_client, cache, refresh_lock) = match &self.keys {
            KeySource::Static { kid: known, key } if known == kid => return Ok(key.clone()),
            KeySource::Static { .. } => {
                return Err(OidcError::Rejected(format!("unknown JWT kid: {kid}")))
            }
            KeySource::Jwks {
                http_client,
                cache,
                refresh_lock,
            } => (http_client, cache, refresh_lock),
        };

        if let Some(key) = cached_key(cache, kid).await {
            return Ok(key);
        }

        // Google rotates keys; a miss on a fresh cache forces one refetch.
        for force in [false, true] {
            let guard = refresh_lock.lock().await;
            let fresh = cache
                .read()
                .await
                .as_ref()
                .is_some_and(|c| c.expires_at > Instant::now());
            if force || !fresh {
                *cache.write().await = Some(fetch_jwks(http_client).await?);
            }
            drop(guard);

            if let Some(key) = cached_key(cache, kid).await {
                return Ok(key);
            }
        }

        Err(OidcError::Rejected(format!("JWT kid not found in JWKS: {kid}")))
    }
}

async fn cached_key(cache: &RwLock<Option<KeyCache>>, kid: &str) -> Option<Arc<DecodingKey>> {
    let now = Instant::now();
    cache
        .read()
        .await
        .as_ref()
        .filter(|c| c.expires_at > now)
        .and_then(|c| c.keys_by_kid.get(kid))
        .cloned()
}

async fn fetch_jwks(http_client: &reqwest::Client) -> Result<KeyCache, OidcError> {
    let response = http_client
        .get(JWKS_URL)
        .send()
        .await
        .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(OidcError::Transient(format!(
            "JWKS request returned status {}",
            response.status()
        )));
    }

    let ttl = response
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_max_age)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CACHE_TTL);

    let jwks: Jwks = response
        .json()
        .await
        .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

    let keys_by_kid: HashMap<String, Arc<DecodingKey>> = jwks
        .keys
        .into_iter()
        .filter(|jwk| jwk.kty == "RSA" && !jwk.kid.trim().is_empty())
        .filter(|jwk| jwk.alg.as_deref().map_or(true, |alg| alg == "RS256"))
        .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => Some((jwk.kid, Arc::new(key))),
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid JWKS key");
                None
            }
        })
        .collect();

    if keys_by_kid.is_empty() {
        return Err(OidcError::Transient(
            "JWKS response had no usable RSA keys".to_string(),
        ));
    }

    tracing::debug!(ttl_secs = ttl.as_secs(), keys = keys_by_kid.len(), "Google JWKS refreshed");
    Ok(KeyCache {
        keys_by_kid,
        expires_at: Instant::now() + ttl,
    })
}

/// `max-age` seconds from a Cache-Control header value.
fn parse_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|d| d.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}
