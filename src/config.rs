// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and kept in memory. On Cloud Run they
//! arrive as environment variables through secret bindings.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::env;
use std::time::Duration;

use crate::services::password::PasswordCost;

/// Which `TrackerStore` backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Google OAuth client credentials. Federated sign-in is disabled without them.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for redirects and CORS
    pub frontend_url: String,
    /// Public URL of this API (Google redirect URI base)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Storage backend
    pub store_backend: StoreBackend,
    /// Upper bound for a single store operation
    pub store_timeout: Duration,
    /// Argon2 cost parameters
    pub password_cost: PasswordCost,

    // --- Secrets ---
    /// HS256 key for access tokens
    pub jwt_access_secret: Vec<u8>,
    /// HS256 key for refresh tokens
    pub jwt_refresh_secret: Vec<u8>,
    /// HS256 key for federated session cookies
    pub session_secret: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Google OAuth client (optional)
    pub google: Option<GoogleOAuthConfig>,
}

impl Config {
    /// Config for tests: in-memory store, cheap hashing, fixed distinct secrets.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            store_timeout: Duration::from_secs(5),
            password_cost: PasswordCost::testing(),
            jwt_access_secret: b"test_access_key_32_bytes_minimum".to_vec(),
            jwt_refresh_secret: b"test_refresh_key_32_bytes_minimu".to_vec(),
            session_secret: b"test_session_key_32_bytes_minimu".to_vec(),
            oauth_state_key: b"test_state_key".to_vec(),
            google: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        let jwt_access_secret = required_secret("JWT_SECRET")?;
        let jwt_refresh_secret = required_secret("JWT_REFRESH_SECRET")?;
        let session_secret = required_secret("AUTH_SECRET")?;
        ensure_distinct(&jwt_access_secret, &jwt_refresh_secret, &session_secret)?;

        let oauth_state_key = match env::var("OAUTH_STATE_KEY") {
            Ok(v) if !v.trim().is_empty() => {
                let key = v.trim().as_bytes().to_vec();
                if [&jwt_access_secret, &jwt_refresh_secret, &session_secret].contains(&&key) {
                    return Err(ConfigError::SharedSecret("OAUTH_STATE_KEY", "a token secret"));
                }
                key
            }
            _ => derive_state_key(&session_secret)?,
        };

        let google = match (
            env::var("AUTH_GOOGLE_CLIENT_ID"),
            env::var("AUTH_GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleOAuthConfig {
                client_id: client_id.trim().to_string(),
                client_secret: client_secret.trim().to_string(),
            }),
            _ => None,
        };

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| format!("http://localhost:{port}")),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port,
            store_backend,
            store_timeout: Duration::from_millis(
                env::var("STORE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            ),
            password_cost: PasswordCost::default(),
            jwt_access_secret,
            jwt_refresh_secret,
            session_secret,
            oauth_state_key,
            google,
        })
    }

    /// Cookies carry `Secure` when the frontend is served over https.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

fn required_secret(name: &'static str) -> Result<Vec<u8>, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value.as_bytes().to_vec())
}

fn ensure_distinct(access: &[u8], refresh: &[u8], session: &[u8]) -> Result<(), ConfigError> {
    if access == refresh {
        return Err(ConfigError::SharedSecret("JWT_SECRET", "JWT_REFRESH_SECRET"));
    }
    if access == session {
        return Err(ConfigError::SharedSecret("JWT_SECRET", "AUTH_SECRET"));
    }
    if refresh == session {
        return Err(ConfigError::SharedSecret("JWT_REFRESH_SECRET", "AUTH_SECRET"));
    }
    Ok(())
}

/// OAuth state key derived from the session secret, used when
/// `OAUTH_STATE_KEY` is unset. Never equal to the session key itself.
fn derive_state_key(session_secret: &[u8]) -> Result<Vec<u8>, ConfigError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(session_secret)
        .map_err(|e| ConfigError::Invalid("AUTH_SECRET", e.to_string()))?;
    mac.update(b"codejar-tracker oauth state v1");
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),

    #[error("{0} and {1} must not share a value")]
    SharedSecret(&'static str, &'static str),
}
