// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-client attempt limiter keyed by client address.
//!
//! Backed by a keyed `governor` GCRA limiter: a client gets `max_attempts`
//! immediately and regains one attempt every `window / max_attempts`.
//! State lives in process memory.

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::Quota;
use std::num::NonZeroU32;
use std::time::Duration;

/// Drop idle keys once the store grows past this many entries.
const SWEEP_THRESHOLD: usize = 10_000;

type KeyedLimiter<C> = governor::RateLimiter<
    String,
    DashMapStateStore<String>,
    C,
    NoOpMiddleware<<C as Clock>::Instant>,
>;

pub struct RateLimiter<C: Clock = DefaultClock> {
    name: &'static str,
    limiter: KeyedLimiter<C>,
    clock: C,
}

impl RateLimiter<DefaultClock> {
    pub fn new(name: &'static str, max_attempts: u32, window: Duration) -> Self {
        Self::with_clock(name, max_attempts, window, DefaultClock::default())
    }

    /// 3 registrations per hour.
    pub fn register() -> Self {
        Self::new("register", 3, Duration::from_secs(60 * 60))
    }

    /// 5 logins per 15 minutes.
    pub fn login() -> Self {
        Self::new("login", 5, Duration::from_secs(15 * 60))
    }

    /// 20 refreshes per 15 minutes.
    pub fn refresh() -> Self {
        Self::new("refresh", 20, Duration::from_secs(15 * 60))
    }
}

impl<C: Clock + Clone> RateLimiter<C> {
    pub fn with_clock(name: &'static str, max_attempts: u32, window: Duration, clock: C) -> Self {
        Self {
            name,
            limiter: governor::RateLimiter::dashmap_with_clock(
                quota(max_attempts, window),
                &clock,
            ),
            clock,
        }
    }

    /// Record an attempt for `key`. `Err(retry_after)` when over the limit.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        if self.limiter.len() > SWEEP_THRESHOLD {
            self.limiter.retain_recent();
        }

        self.limiter.check_key(&key.to_string()).map_err(|not_until| {
            tracing::warn!(limiter = self.name, key, "Rate limit exceeded");
            not_until.wait_time_from(self.clock.now())
        })
    }
}

/// `max_attempts` per `window`, all usable at once.
fn quota(max_attempts: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(max_attempts).unwrap_or(NonZeroU32::MIN);
    let period = window / burst.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
