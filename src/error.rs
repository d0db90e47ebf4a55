// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Email already registered")]
    ConflictLocal,

    #[error("Email already used for Google sign-in")]
    ConflictFederated,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Account uses Google sign-in")]
    FederatedOnly,

    #[error("Incorrect password")]
    InvalidCredentials,

    #[error("Refresh token required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User no longer exists")]
    UserGone,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Too many attempts, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    /// HTTP status for this error. Total over all variants.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MissingToken => StatusCode::BAD_REQUEST,
            AppError::ConflictLocal | AppError::ConflictFederated => StatusCode::CONFLICT,
            AppError::NotFound(_) | AppError::UserGone => StatusCode::NOT_FOUND,
            AppError::FederatedOnly
            | AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "bad_request",
            AppError::ConflictLocal => "email_registered",
            AppError::ConflictFederated => "email_federated",
            AppError::NotFound(_) => "not_found",
            AppError::FederatedOnly => "federated_only",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::MissingToken => "missing_token",
            AppError::InvalidToken => "invalid_token",
            AppError::UserGone => "user_not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Unavailable(_) => "unavailable",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Short user-safe message. Never includes store or infrastructure detail.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::ConflictLocal => "Email already registered.".to_string(),
            AppError::ConflictFederated => {
                "Email already used for Google login. Please use Google Sign-In.".to_string()
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::FederatedOnly => {
                "This account uses Google Sign-In. Please continue with Google.".to_string()
            }
            AppError::InvalidCredentials => "Incorrect password".to_string(),
            AppError::MissingToken => "Refresh token required".to_string(),
            AppError::InvalidToken => "Invalid or expired refresh token".to_string(),
            AppError::UserGone => "User not found".to_string(),
            AppError::Unauthorized => "Unauthenticated".to_string(),
            AppError::RateLimited { .. } => {
                "Too many attempts. Please try again later.".to_string()
            }
            AppError::Unavailable(_) => {
                "Service temporarily unavailable. Please retry.".to_string()
            }
            AppError::Database(_) | AppError::Internal(_) => "Server error".to_string(),
        }
    }

    /// Whether a client may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Unavailable(_) | AppError::Database(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(msg) => tracing::error!(error = %msg, "Database error"),
            AppError::Internal(err) => tracing::error!(error = %err, "Internal server error"),
            AppError::Unavailable(msg) => tracing::warn!(reason = %msg, "Transient failure"),
            _ => {}
        }

        let status = self.status();
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message(),
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_variants_share_status_but_not_code() {
        assert_eq!(AppError::ConflictLocal.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::ConflictFederated.status(), StatusCode::CONFLICT);
        assert_ne!(
            AppError::ConflictLocal.code(),
            AppError::ConflictFederated.code()
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = AppError::Database("connection reset by peer at 10.0.0.3".to_string());
        assert_eq!(err.public_message(), "Server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_timeouts_are_transient_not_auth_failures() {
        let err = AppError::Unavailable("store timed out".to_string());
        assert!(err.is_transient());
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!AppError::Unauthorized.is_transient());
    }
}
