//! Configuration management for the check-in guard.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::ratelimit::RateLimitConfig;

/// Prefix for environment variable overrides, e.g. `CHECKIN_GUARD__LIMITS__CHECKIN__MAX_REQUESTS`.
pub const ENV_PREFIX: &str = "CHECKIN_GUARD";

/// Main configuration for the check-in guard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Limiter policies
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Background cleanup configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Policies for the pre-configured limiters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// General server actions and login attempts
    #[serde(default = "default_action_limit")]
    pub action: RateLimitConfig,

    /// Check-in and check-in reset
    #[serde(default = "default_checkin_limit")]
    pub checkin: RateLimitConfig,

    /// Database status reads
    #[serde(default = "default_database_limit")]
    pub database: RateLimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            action: default_action_limit(),
            checkin: default_checkin_limit(),
            database: default_database_limit(),
        }
    }
}

fn default_action_limit() -> RateLimitConfig {
    RateLimitConfig::new(100, 60_000)
}

fn default_checkin_limit() -> RateLimitConfig {
    RateLimitConfig::new(10, 60_000)
}

fn default_database_limit() -> RateLimitConfig {
    RateLimitConfig::new(30, 60_000)
}

/// Background cleanup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between cleanup sweeps
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
        }
    }
}

impl CleanupConfig {
    /// The sweep period as a `Duration`.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

fn default_cleanup_interval() -> u64 {
    300
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GuardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GuardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file layered under environment overrides.
    ///
    /// Nested keys use `__` as separator, so
    /// `CHECKIN_GUARD__CLEANUP__INTERVAL_SECS=60` sets `cleanup.interval_secs`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration");
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config: GuardConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check every limiter policy and the cleanup period.
    pub fn validate(&self) -> Result<()> {
        for (name, limit) in [
            ("action", &self.limits.action),
            ("checkin", &self.limits.checkin),
            ("database", &self.limits.database),
        ] {
            limit
                .validate()
                .map_err(|e| Error::Config(format!("limits.{}: {}", name, e)))?;
        }

        if self.cleanup.interval_secs == 0 {
            return Err(Error::Config(
                "cleanup.interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.limits.action, RateLimitConfig::new(100, 60_000));
        assert_eq!(config.limits.checkin, RateLimitConfig::new(10, 60_000));
        assert_eq!(config.limits.database, RateLimitConfig::new(30, 60_000));
        assert_eq!(config.cleanup.interval_secs, 300);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
limits:
  checkin:
    maxRequests: 5
    windowMs: 30000
cleanup:
  interval_secs: 60
"#;
        let config = GuardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limits.checkin, RateLimitConfig::new(5, 30_000));
        // Unspecified policies keep their defaults
        assert_eq!(config.limits.action, RateLimitConfig::new(100, 60_000));
        assert_eq!(config.cleanup.interval_secs, 60);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = GuardConfig::from_yaml("{}").unwrap();
        assert_eq!(config, GuardConfig::default());
    }

    #[test]
    fn test_rejects_invalid_policy() {
        let yaml = r#"
limits:
  database:
    max_requests: 0
    window_ms: 60000
"#;
        let err = GuardConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("limits.database"));
    }

    #[test]
    fn test_rejects_zero_cleanup_interval() {
        let yaml = "cleanup:\n  interval_secs: 0\n";
        assert!(GuardConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        let err = GuardConfig::from_yaml("limits: [unterminated").unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration"));
    }

    #[test]
    fn test_from_missing_file() {
        let err = GuardConfig::from_file("/nonexistent/checkin-guard.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
