//! Core sliding-window rate limiter.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::entry::{millis_between, RateLimitConfig, RateLimitEntry, RateLimitResult};
use crate::error::{Error, Result};

/// How often the background sweep forgets idle identifiers by default.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Label used in log fields when a limiter has not been named.
const DEFAULT_NAME: &str = "default";

/// State shared between a limiter and its cleanup sweeper.
struct Shared {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    /// Per-identifier history; each shard carries its own lock
    entries: DashMap<String, RateLimitEntry>,
}

impl Shared {
    /// Forget every entry with nothing in the window and no running cooldown.
    fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let window_start = now.saturating_sub(self.config.window_ms_i64());

        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let stale = entry.is_stale(now, window_start);
            if stale {
                removed += 1;
            }
            !stale
        });
        removed
    }
}

/// An in-memory sliding-window rate limiter.
///
/// Each identifier keeps the timestamps of its admitted requests. A request
/// is admitted while fewer than `max_requests` of them fall inside the
/// trailing window. The first request over the limit puts the identifier in
/// a cooldown lasting a full window, during which every request is rejected
/// without consulting the history.
///
/// This struct is thread-safe and can be shared across multiple tasks.
pub struct RateLimiter {
    name: String,
    shared: Arc<Shared>,
    /// Handle of the recurring cleanup task, if one is running
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter driven by the system clock.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter driven by the given clock.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            shared: Arc::new(Shared {
                config,
                clock,
                entries: DashMap::new(),
            }),
            sweeper: Mutex::new(None),
        })
    }

    /// Attach a label that shows up in this limiter's log events.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The label used in log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The policy this limiter enforces.
    pub fn config(&self) -> RateLimitConfig {
        self.shared.config
    }

    /// Decide whether a request from `identifier` is admitted.
    ///
    /// An admitted request is recorded against the identifier's window.
    pub fn check(&self, identifier: &str) -> RateLimitResult {
        let config = self.shared.config;
        let now = self.shared.clock.now_ms();
        let window_ms = config.window_ms_i64();
        let window_start = now.saturating_sub(window_ms);

        // The shard write lock is held until `entry` drops, so the whole
        // read-modify-write below is atomic per identifier
        let mut entry = self
            .shared
            .entries
            .entry(identifier.to_owned())
            .or_insert_with(|| {
                debug!(
                    limiter = %self.name,
                    identifier = %identifier,
                    "Creating rate limit entry"
                );
                RateLimitEntry::default()
            });

        if let Some(blocked_until) = entry.active_block(now) {
            let result = RateLimitResult::blocked(blocked_until, now);
            trace!(
                limiter = %self.name,
                identifier = %identifier,
                retry_after_ms = result.retry_after_ms,
                "Identifier is cooling down"
            );
            return result;
        }

        entry.prune(window_start);
        entry.blocked = false;

        if entry.timestamps.len() >= config.max_requests as usize {
            entry.blocked = true;
            entry.blocked_until = now.saturating_add(window_ms);

            debug!(
                limiter = %self.name,
                identifier = %identifier,
                blocked_until = entry.blocked_until,
                "Rate limit exceeded, blocking identifier"
            );

            return RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_time: entry.blocked_until,
                retry_after_ms: config.window_ms,
            };
        }

        entry.timestamps.push_back(now);

        let used = u32::try_from(entry.timestamps.len()).unwrap_or(u32::MAX);
        let remaining = config.max_requests.saturating_sub(used);
        let oldest = entry.timestamps.front().copied().unwrap_or(now);

        trace!(
            limiter = %self.name,
            identifier = %identifier,
            remaining = remaining,
            "Request admitted"
        );

        RateLimitResult {
            allowed: true,
            remaining,
            reset_time: oldest.saturating_add(window_ms),
            retry_after_ms: 0,
        }
    }

    /// Report what `check` would decide for `identifier` without recording anything.
    pub fn peek(&self, identifier: &str) -> RateLimitResult {
        let config = self.shared.config;
        let now = self.shared.clock.now_ms();
        let window_ms = config.window_ms_i64();
        let window_start = now.saturating_sub(window_ms);

        let Some(entry) = self.shared.entries.get(identifier) else {
            return RateLimitResult {
                allowed: true,
                remaining: config.max_requests,
                reset_time: now.saturating_add(window_ms),
                retry_after_ms: 0,
            };
        };

        if let Some(blocked_until) = entry.active_block(now) {
            return RateLimitResult::blocked(blocked_until, now);
        }

        let oldest = entry.valid_timestamps(window_start).next().unwrap_or(now);
        let valid = u32::try_from(entry.valid_timestamps(window_start).count()).unwrap_or(u32::MAX);
        let remaining = config.max_requests.saturating_sub(valid);
        let allowed = remaining > 0;
        let reset_time = oldest.saturating_add(window_ms);

        RateLimitResult {
            allowed,
            remaining,
            reset_time,
            retry_after_ms: if allowed { 0 } else { millis_between(now, reset_time) },
        }
    }

    /// Forget everything about `identifier`, including any cooldown.
    pub fn reset(&self, identifier: &str) {
        if self.shared.entries.remove(identifier).is_some() {
            debug!(limiter = %self.name, identifier = %identifier, "Rate limit entry reset");
        }
    }

    /// Remove idle entries and return how many were dropped.
    ///
    /// An entry survives while it has a timestamp inside the window or a
    /// cooldown that has not yet ended.
    pub fn cleanup(&self) -> usize {
        let removed = self.shared.sweep();
        debug!(
            limiter = %self.name,
            removed = removed,
            remaining_entries = self.shared.entries.len(),
            "Rate limit cleanup finished"
        );
        removed
    }

    /// Run `cleanup` every `period` on the current tokio runtime.
    ///
    /// The first sweep happens one period from now. Starting a sweeper
    /// replaces any previous one. The task only holds a weak reference to
    /// the limiter state and exits once the limiter is gone.
    pub fn start_cleanup(&self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(Error::InvalidConfig(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let name = self.name.clone();

        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(shared) = shared.upgrade() else {
                    break;
                };
                let removed = shared.sweep();
                debug!(
                    limiter = %name,
                    removed = removed,
                    remaining_entries = shared.entries.len(),
                    "Periodic rate limit cleanup"
                );
            }
        });

        if let Some(previous) = self.sweeper.lock().replace(task) {
            previous.abort();
        }

        info!(
            limiter = %self.name,
            period_secs = period.as_secs(),
            "Rate limit cleanup scheduled"
        );
        Ok(())
    }

    /// Whether a cleanup sweeper is currently scheduled.
    pub fn is_cleanup_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the cleanup sweeper and drop all state.
    ///
    /// The limiter stays usable; later checks start from an empty map.
    pub fn destroy(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
        }
        self.shared.entries.clear();
        info!(limiter = %self.name, "Rate limiter destroyed");
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Whether no identifier is currently tracked.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    /// A copy of the stored state for `identifier`.
    pub fn entry(&self, identifier: &str) -> Option<RateLimitEntry> {
        self.shared.entries.get(identifier).map(|e| e.value().clone())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("config", &self.shared.config)
            .field("entries", &self.shared.entries.len())
            .finish()
    }
}
