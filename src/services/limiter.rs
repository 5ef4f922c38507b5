// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user rate limiting for Drive API calls.
//!
//! Each user gets a reservoir of permits that resets to its ceiling on a
//! fixed interval. Calls beyond the reservoir wait for the next window; no
//! call is ever rejected. Throttling responses (429) from scheduled calls
//! are retried with exponential backoff up to a fixed cap; any other
//! failure propagates to the caller untouched.

use crate::error::AppError;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration, Instant};

/// Permits per user per refill window.
pub const RESERVOIR_CAPACITY: u32 = 150;

/// Reservoir refill interval. The reservoir resets to the ceiling, it is
/// not topped up additively.
pub const REFILL_INTERVAL: Duration = Duration::from_millis(1000);

/// Maximum retries for a throttled (429) call.
pub const MAX_THROTTLE_RETRIES: u32 = 5;

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Backoff before retry number `retry` (0-based): `min(1000 * 2^retry, 30000)` ms.
pub fn backoff_delay(retry: u32) -> Duration {
    let ms = 1000u64
        .saturating_mul(2u64.saturating_pow(retry))
        .min(MAX_RETRY_DELAY_MS);
    Duration::from_millis(ms)
}

struct Reservoir {
    window_start: Instant,
    remaining: u32,
}

/// Reservoir-based rate limiter for one user.
pub struct RateLimiter {
    capacity: u32,
    interval: Duration,
    state: tokio::sync::Mutex<Reservoir>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_settings(RESERVOIR_CAPACITY, REFILL_INTERVAL)
    }

    pub fn with_settings(capacity: u32, interval: Duration) -> Self {
        Self {
            capacity,
            interval,
            state: tokio::sync::Mutex::new(Reservoir {
                window_start: Instant::now(),
                remaining: capacity,
            }),
        }
    }

    /// Take one permit, waiting for the next refill window when the
    /// reservoir is drained. Waiters are admitted in no particular order.
    pub async fn acquire(&self) {
        loop {
            let next_window = {
                let mut reservoir = self.state.lock().await;
                let now = Instant::now();
                if now.duration_since(reservoir.window_start) >= self.interval {
                    reservoir.window_start = now;
                    reservoir.remaining = self.capacity;
                }
                if reservoir.remaining > 0 {
                    reservoir.remaining -= 1;
                    return;
                }
                reservoir.window_start + self.interval
            };
            time::sleep_until(next_window).await;
        }
    }

    /// Run `call` through the reservoir, transparently retrying throttled
    /// failures. Each retry takes a fresh permit.
    pub async fn schedule<T, F, Fut>(&self, call: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut retry = 0;
        loop {
            self.acquire().await;
            match call().await {
                Err(e) if e.is_rate_limited() && retry < MAX_THROTTLE_RETRIES => {
                    let delay = backoff_delay(retry);
                    retry += 1;
                    tracing::warn!(
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "429 from Drive, backing off"
                    );
                    time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Default cap on the number of users with a live limiter.
pub const DEFAULT_MAX_TRACKED_USERS: usize = 4096;

struct LimiterEntry {
    limiter: Arc<RateLimiter>,
    last_used: AtomicU64,
}

/// Registry of per-user limiters, created lazily on first use.
///
/// Bounded: when the registry grows past its cap, the least recently used
/// entry is evicted. Limiter state is only a throttle window, so an evicted
/// user simply starts over with a full reservoir.
pub struct LimiterRegistry {
    limiters: DashMap<String, LimiterEntry>,
    max_users: usize,
    clock: AtomicU64,
}

impl LimiterRegistry {
    pub fn new(max_users: usize) -> Self {
        Self {
            limiters: DashMap::new(),
            max_users,
            clock: AtomicU64::new(0),
        }
    }

    /// Get the limiter for a user, creating it on first use.
    pub fn get_or_create(&self, google_id: &str) -> Arc<RateLimiter> {
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed);
        if let Some(entry) = self.limiters.get(google_id) {
            entry.last_used.store(stamp, Ordering::Relaxed);
            return entry.limiter.clone();
        }

        let limiter = self
            .limiters
            .entry(google_id.to_string())
            .or_insert_with(|| LimiterEntry {
                limiter: Arc::new(RateLimiter::new()),
                last_used: AtomicU64::new(stamp),
            })
            .limiter
            .clone();

        self.evict_over_capacity();
        limiter
    }

    fn evict_over_capacity(&self) {
        while self.limiters.len() > self.max_users {
            let oldest = self
                .limiters
                .iter()
                .min_by_key(|entry| entry.last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(user = %key, "Evicting idle rate limiter");
                    self.limiters.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
