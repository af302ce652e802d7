//! Token bucket rate limiter.

use parking_lot::Mutex;
use std::time::Instant;

use crate::error::{Result, TollgateError};

/// Resolution of `Instant` arithmetic, in seconds.
const CLOCK_RESOLUTION_SECS: f64 = 1e-9;

/// Mutable bucket state, guarded by the bucket's own lock.
#[derive(Debug)]
struct BucketState {
    /// Tokens available as of `last_refill` (fractional for smooth refill)
    tokens: f64,
    /// When `tokens` was last brought up to date
    last_refill: Instant,
}

/// A token bucket for a single (client, endpoint) pair.
///
/// Tokens accumulate continuously at `rate` per second up to `burst`, and
/// each successful [`allow`](TokenBucket::allow) consumes exactly one. The
/// bucket starts full.
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens added per second
    rate: f64,
    /// Maximum number of tokens the bucket can hold
    burst: u32,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a new bucket refilling at `rate` tokens per second with
    /// capacity `burst`.
    pub fn new(rate: f64, burst: u32) -> Result<Self> {
        if burst == 0 {
            return Err(TollgateError::Validation(
                "burst size must be positive".to_string(),
            ));
        }
        if !(rate.is_finite() && rate > 0.0) {
            return Err(TollgateError::Validation(format!(
                "refill rate must be positive, got {}",
                rate
            )));
        }

        Ok(Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Take one token if one is available right now.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Take one token if one is available at `now`.
    ///
    /// On failure the bucket is left untouched.
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        let available = self.refilled(&state, now);

        if available + self.slack() < 1.0 {
            return false;
        }

        state.tokens = (available - 1.0).max(0.0);
        state.last_refill = now.max(state.last_refill);
        true
    }

    /// Number of tokens that would be available at `now`.
    pub fn available_at(&self, now: Instant) -> f64 {
        let state = self.state.lock();
        self.refilled(&state, now)
    }

    /// Get the refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Get the burst capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Shortfall still counted as a whole token.
    ///
    /// Both ends of a wait of `1 / rate` seconds are rounded to whole
    /// nanoseconds, so the refill it produces can land a hair under one token.
    fn slack(&self) -> f64 {
        2.0 * self.rate * CLOCK_RESOLUTION_SECS + f64::EPSILON * self.burst as f64
    }

    fn refilled(&self, state: &BucketState, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(state.last_refill);
        (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst as f64)
    }
}
