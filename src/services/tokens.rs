// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stateless signed tokens (HS256 JWT).
//!
//! Three kinds share one claim shape but each has its own secret and
//! lifetime, and the `kind` claim is checked on verify. A refresh token can
//! therefore never pass as an access token, even if secrets were shared.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::Config;

pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const SESSION_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Which secret/lifetime a token was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    /// Federated provider session
    Session,
}

impl TokenKind {
    pub fn ttl(self) -> Duration {
        match self {
            TokenKind::Access => ACCESS_TOKEN_TTL,
            TokenKind::Refresh => REFRESH_TOKEN_TTL,
            TokenKind::Session => SESSION_TOKEN_TTL,
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, malformed input, or wrong kind
    #[error("token is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Issues and verifies access, refresh and session tokens.
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    session: KeyPair,
}

impl TokenService {
    pub fn new(config: &Config) -> Self {
        Self {
            access: KeyPair::new(&config.jwt_access_secret),
            refresh: KeyPair::new(&config.jwt_refresh_secret),
            session: KeyPair::new(&config.session_secret),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::Session => &self.session,
        }
    }

    pub fn issue_access(&self, user_id: &str, email: &str) -> anyhow::Result<String> {
        self.issue_at(TokenKind::Access, user_id, email, SystemTime::now())
    }

    pub fn issue_refresh(&self, user_id: &str, email: &str) -> anyhow::Result<String> {
        self.issue_at(TokenKind::Refresh, user_id, email, SystemTime::now())
    }

    pub fn issue_session(&self, user_id: &str, email: &str) -> anyhow::Result<String> {
        self.issue_at(TokenKind::Session, user_id, email, SystemTime::now())
    }

    /// Issue a token as of `issued_at`. Deterministic for a given clock.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        user_id: &str,
        email: &str,
        issued_at: SystemTime,
    ) -> anyhow::Result<String> {
        let iat = issued_at.duration_since(UNIX_EPOCH)?.as_secs();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            kind,
            iat,
            exp: iat + kind.ttl().as_secs(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )?)
    }

    /// Verify `token` as a token of `kind`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<TokenClaims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        if data.claims.kind != kind {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&Config::test_default())
    }

    #[test]
    fn test_access_token_round_trip() {
        let tokens = service();
        let token = tokens.issue_access("u1", "a@x.com").unwrap();
        let claims = tokens.verify(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_never_verifies_as_access() {
        let tokens = service();
        let refresh = tokens.issue_refresh("u1", "a@x.com").unwrap();

        assert_eq!(
            tokens.verify(&refresh, TokenKind::Access),
            Err(TokenError::Invalid)
        );
        assert!(tokens.verify(&refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_kind_checked_even_with_shared_secret() {
        let mut config = Config::test_default();
        config.jwt_refresh_secret = config.jwt_access_secret.clone();
        let tokens = TokenService::new(&config);

        let refresh = tokens.issue_refresh("u1", "a@x.com").unwrap();
        assert_eq!(
            tokens.verify(&refresh, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let long_ago = SystemTime::now() - Duration::from_secs(16 * 60);
        let token = tokens
            .issue_at(TokenKind::Access, "u1", "a@x.com", long_ago)
            .unwrap();

        assert_eq!(
            tokens.verify(&token, TokenKind::Access),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_issue_at_is_deterministic() {
        let tokens = service();
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = tokens.issue_at(TokenKind::Refresh, "u1", "a@x.com", at).unwrap();
        let b = tokens.issue_at(TokenKind::Refresh, "u1", "a@x.com", at).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_token() {
        assert_eq!(
            service().verify("not.a.jwt", TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }
}
