//! API configuration
//!
//! Loaded from `API_*` environment variables; every field has a default so
//! a bare environment yields a working local setup.

use std::time::Duration;

use serde::Deserialize;

use core_kernel::CoreError;
use domain_numbering::{AllocatorConfig, DepletionThreshold};
use infra_db::DatabaseConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for local development
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// Log filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    pub log_format: LogFormat,
    /// Commit attempts per allocation
    pub max_retries: u32,
    /// Base backoff between attempts
    pub retry_backoff_ms: u64,
    /// Longest wait for a series lock
    pub lock_timeout_ms: u64,
    /// Upper bound for a single storage call
    pub operation_timeout_ms: u64,
    /// Warn when this many numbers or fewer remain
    pub near_depletion_remaining: i64,
    /// Warn when usage reaches this percentage
    pub near_depletion_usage_percent: u8,
    /// Minimum digit width of policy numbers
    pub min_number_width: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/numbering".to_string(),
            max_connections: 10,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            max_retries: 5,
            retry_backoff_ms: 10,
            lock_timeout_ms: 2_000,
            operation_timeout_ms: 5_000,
            near_depletion_remaining: 50,
            near_depletion_usage_percent: 90,
            min_number_width: 6,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Rejects settings the service cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.port == 0 {
            return Err(CoreError::configuration("port must be non-zero"));
        }
        if self.max_connections == 0 {
            return Err(CoreError::configuration("max_connections must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(CoreError::configuration("max_retries must be at least 1"));
        }
        if self.lock_timeout_ms == 0 || self.operation_timeout_ms == 0 {
            return Err(CoreError::configuration("timeouts must be non-zero"));
        }
        if self.near_depletion_remaining < 0 {
            return Err(CoreError::configuration(
                "near_depletion_remaining cannot be negative",
            ));
        }
        if !(1..=100).contains(&self.near_depletion_usage_percent) {
            return Err(CoreError::configuration(
                "near_depletion_usage_percent must be between 1 and 100",
            ));
        }
        if !(1..=18).contains(&self.min_number_width) {
            return Err(CoreError::configuration(
                "min_number_width must be between 1 and 18",
            ));
        }
        Ok(())
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Allocator settings derived from this configuration
    pub fn allocator_config(&self) -> AllocatorConfig {
        AllocatorConfig::default()
            .with_max_retries(self.max_retries)
            .with_retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
            .with_operation_timeout(Duration::from_millis(self.operation_timeout_ms))
            .with_threshold(DepletionThreshold {
                remaining: self.near_depletion_remaining,
                usage_percent: self.near_depletion_usage_percent,
            })
            .with_min_number_width(self.min_number_width)
    }

    /// Pool settings derived from this configuration
    pub fn database_config(&self) -> DatabaseConfig {
        // Pool waits must end before the allocator gives up on the call
        let acquire = Duration::from_millis(self.operation_timeout_ms / 2).max(Duration::from_millis(100));
        DatabaseConfig::new(&self.database_url)
            .max_connections(self.max_connections)
            .connect_timeout(acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");

        let allocator = config.allocator_config();
        assert_eq!(allocator.max_retries, 5);
        assert_eq!(allocator.threshold, DepletionThreshold::default());
        assert_eq!(allocator.min_number_width, 6);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let config = ApiConfig {
            near_depletion_usage_percent: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Configuration(_))));

        let config = ApiConfig {
            min_number_width: 19,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ApiConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_acquire_is_below_operation_timeout() {
        let config = ApiConfig::default();
        let db = config.database_config();
        assert!(db.connect_timeout < Duration::from_millis(config.operation_timeout_ms));
        assert_eq!(db.max_connections, 10);
    }
}
