//! Limiter policy, per-identifier state and admission results.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shortest sliding window a limiter accepts, in milliseconds.
pub const MIN_WINDOW_MS: u64 = 1000;

/// Admission policy for a single limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Admitted requests per window
    #[serde(alias = "maxRequests")]
    pub max_requests: u32,
    /// Sliding window length in milliseconds
    #[serde(alias = "windowMs")]
    pub window_ms: u64,
}

impl RateLimitConfig {
    /// Create a policy admitting `max_requests` per `window_ms`.
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    /// Reject policies the limiter cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests < 1 {
            return Err(Error::InvalidConfig(format!(
                "max_requests must be at least 1, got {}",
                self.max_requests
            )));
        }
        if self.window_ms < MIN_WINDOW_MS {
            return Err(Error::InvalidConfig(format!(
                "window_ms must be at least {}, got {}",
                MIN_WINDOW_MS, self.window_ms
            )));
        }
        Ok(())
    }

    /// The window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// The window as signed milliseconds, for timestamp arithmetic.
    pub(crate) fn window_ms_i64(&self) -> i64 {
        i64::try_from(self.window_ms).unwrap_or(i64::MAX)
    }
}

/// Request history and cooldown state for one identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Admission times in milliseconds, oldest first
    pub timestamps: VecDeque<i64>,
    /// Whether the identifier is serving a cooldown
    pub blocked: bool,
    /// When the cooldown ends; only meaningful while `blocked`
    pub blocked_until: i64,
}

impl RateLimitEntry {
    /// The end of the cooldown, if one is still running at `now`.
    pub(crate) fn active_block(&self, now: i64) -> Option<i64> {
        (self.blocked && self.blocked_until > now).then_some(self.blocked_until)
    }

    /// Drop timestamps at or before `window_start`.
    pub(crate) fn prune(&mut self, window_start: i64) {
        self.timestamps.retain(|&ts| ts > window_start);
    }

    /// Timestamps that are still inside the window, without modifying the entry.
    pub(crate) fn valid_timestamps(&self, window_start: i64) -> impl Iterator<Item = i64> + '_ {
        self.timestamps
            .iter()
            .copied()
            .filter(move |&ts| ts > window_start)
    }

    /// Whether the cleanup sweep may forget this entry.
    ///
    /// An entry is stale when nothing is left in the window and it is not
    /// serving a cooldown that is still running.
    pub(crate) fn is_stale(&self, now: i64, window_start: i64) -> bool {
        self.valid_timestamps(window_start).next().is_none() && self.active_block(now).is_none()
    }
}

/// The outcome of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the limit resets, in milliseconds since the epoch
    pub reset_time: i64,
    /// How long to wait before retrying; zero when allowed
    pub retry_after_ms: u64,
}

impl RateLimitResult {
    /// A rejection while a cooldown ending at `blocked_until` is running.
    pub(crate) fn blocked(blocked_until: i64, now: i64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_time: blocked_until,
            retry_after_ms: millis_between(now, blocked_until),
        }
    }

    /// Seconds to wait before retrying, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }

    /// Time to wait before retrying.
    pub fn retry_after(&self) -> Duration {
        Duration::from_millis(self.retry_after_ms)
    }
}

/// Non-negative distance from `from` to `to` in milliseconds.
pub(crate) fn millis_between(from: i64, to: i64) -> u64 {
    u64::try_from(to.saturating_sub(from)).unwrap_or(0)
}
