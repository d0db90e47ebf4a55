// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, client address, security headers).

pub mod auth;
pub mod client_addr;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use client_addr::ClientAddr;
