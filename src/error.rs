//! Error types for the check-in guard.

use thiserror::Error;

/// Main error type for check-in guard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A limiter policy was rejected at construction time
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),

    /// Configuration loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background work was requested outside a tokio runtime
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias for check-in guard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error code reported to end users when a request is throttled.
pub const RATE_LIMITED_CODE: &str = "RATE_LIMITED";

/// A request that a limiter turned away.
///
/// This is not a failure of the limiter; it carries the decision and the
/// message a caller shows to the end user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Throttled {
    /// The policy that rejected the request
    pub policy: crate::ratelimit::Policy,
    /// The rejecting decision
    pub result: crate::ratelimit::RateLimitResult,
    message: String,
}

impl Throttled {
    /// A rejection reported with the retry delay in whole seconds.
    pub fn new(policy: crate::ratelimit::Policy, result: crate::ratelimit::RateLimitResult) -> Self {
        let message = format!(
            "Rate limit exceeded. Please try again in {} seconds.",
            result.retry_after_secs()
        );
        Self {
            policy,
            result,
            message,
        }
    }

    /// A rejected login attempt; the delay is not disclosed.
    pub fn login(result: crate::ratelimit::RateLimitResult) -> Self {
        Self {
            policy: crate::ratelimit::Policy::Action,
            result,
            message: "Too many login attempts. Please try again later.".to_string(),
        }
    }

    /// The user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error code for action responses.
    pub fn code(&self) -> &'static str {
        RATE_LIMITED_CODE
    }
}
