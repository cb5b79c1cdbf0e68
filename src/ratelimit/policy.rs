//! Pre-configured limiters for the check-in service.
//!
//! Each policy owns an independent limiter with its own state and cleanup
//! schedule. Handlers pick the policy matching the operation they guard.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{RateLimitConfig, RateLimitResult};
use super::identifier::login_identifier;
use super::limiter::RateLimiter;
use crate::config::LimitsConfig;
use crate::error::{Result, Throttled};

/// Which pre-configured limiter guards an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Lenient limit for general actions and login attempts
    Action,
    /// Strict limit for check-in and check-in reset
    Checkin,
    /// Medium limit for database status reads
    Database,
}

impl Policy {
    /// Every policy, in a stable order.
    pub const ALL: [Policy; 3] = [Policy::Action, Policy::Checkin, Policy::Database];

    /// The policy name used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Action => "action",
            Policy::Checkin => "checkin",
            Policy::Database => "database",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of limiters a check-in service runs with.
#[derive(Debug)]
pub struct Limiters {
    action: RateLimiter,
    checkin: RateLimiter,
    database: RateLimiter,
}

impl Limiters {
    /// Build all limiters on the system clock.
    pub fn new(limits: &LimitsConfig) -> Result<Self> {
        Self::with_clock(limits, Arc::new(SystemClock))
    }

    /// Build all limiters on a shared clock.
    pub fn with_clock(limits: &LimitsConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let build = |policy: Policy, config: RateLimitConfig| {
            RateLimiter::with_clock(config, clock.clone()).map(|l| l.named(policy.as_str()))
        };

        Ok(Self {
            action: build(Policy::Action, limits.action)?,
            checkin: build(Policy::Checkin, limits.checkin)?,
            database: build(Policy::Database, limits.database)?,
        })
    }

    /// The limiter for general actions and login attempts.
    pub fn action(&self) -> &RateLimiter {
        &self.action
    }

    /// The limiter for check-in operations.
    pub fn checkin(&self) -> &RateLimiter {
        &self.checkin
    }

    /// The limiter for database status reads.
    pub fn database(&self) -> &RateLimiter {
        &self.database
    }

    /// The limiter enforcing `policy`.
    pub fn get(&self, policy: Policy) -> &RateLimiter {
        match policy {
            Policy::Action => &self.action,
            Policy::Checkin => &self.checkin,
            Policy::Database => &self.database,
        }
    }

    /// Admit a request under `policy` or explain why it was turned away.
    pub fn guard(
        &self,
        policy: Policy,
        identifier: &str,
    ) -> std::result::Result<RateLimitResult, Throttled> {
        let result = self.get(policy).check(identifier);
        if result.allowed {
            return Ok(result);
        }

        warn!(
            policy = %policy,
            identifier = %identifier,
            retry_after_ms = result.retry_after_ms,
            "Request throttled"
        );
        Err(Throttled::new(policy, result))
    }

    /// Admit a login attempt for `participant_id`.
    ///
    /// Attempts are keyed by account rather than client address and share
    /// the action policy.
    pub fn guard_login(&self, participant_id: &str) -> std::result::Result<RateLimitResult, Throttled> {
        self.guard(Policy::Action, &login_identifier(participant_id))
            .map_err(|throttled| Throttled::login(throttled.result))
    }

    /// Schedule the cleanup sweep on every limiter.
    pub fn start_cleanup(&self, period: Duration) -> Result<()> {
        for policy in Policy::ALL {
            self.get(policy).start_cleanup(period)?;
        }
        Ok(())
    }

    /// Stop every sweeper and drop all state.
    pub fn destroy(&self) {
        for policy in Policy::ALL {
            self.get(policy).destroy();
        }
        info!("All rate limiters destroyed");
    }
}
