// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod derived;
pub mod gateway;
pub mod google_oidc;
pub mod google_signin;
pub mod identity;
pub mod ledger;
pub mod password;
pub mod rate_limit;
pub mod tokens;

pub use gateway::{AuthGateway, FederatedSession, IssuedCredentials};
pub use google_oidc::{GoogleOidcVerifier, GoogleProfile, OidcError};
pub use google_signin::GoogleSignIn;
pub use identity::{AuthUser, IdentityResolver, SessionOracle, SignedSessionOracle};
pub use ledger::LedgerService;
pub use password::{PasswordCost, PasswordService};
pub use rate_limit::RateLimiter;
pub use tokens::{TokenKind, TokenService};
