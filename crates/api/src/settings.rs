//! Service configuration
//!
//! Layered from an optional TOML file and `BEDWATCH_*` environment
//! variables (`BEDWATCH_ALERTING__CRITICAL_THRESHOLD=80`). Every field has a
//! default, so an empty environment yields a runnable service.

use alerting::AlertConfig;
use data_validator::ValidationConfig;
use ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Max tracing level (`trace`, `debug`, `info`, `warn`, `error`)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bedwatch.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Full service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub alerting: AlertConfig,
    pub rate_limit: RateLimitConfig,
    pub validation: ValidationConfig,
}

impl ServiceConfig {
    /// Load from `path` (if given and present) overlaid with the environment
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }

        let config: ServiceConfig = builder
            .add_source(
                ::config::Environment::with_prefix("BEDWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.retention_depth == 0 {
            return Err(ConfigError::Invalid(
                "ledger.retention_depth must be at least 1".to_string(),
            ));
        }
        if self.ledger.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "ledger.broadcast_capacity must be at least 1".to_string(),
            ));
        }
        if self.alerting.warning_threshold < self.alerting.critical_threshold {
            return Err(ConfigError::Invalid(format!(
                "alerting.warning_threshold ({}) is below alerting.critical_threshold ({})",
                self.alerting.warning_threshold, self.alerting.critical_threshold
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
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
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.ledger.retention_depth, 10);
        assert_eq!(config.alerting.critical_threshold, 100.0);
        assert_eq!(config.alerting.cooldown_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ServiceConfig::load(Some("/nonexistent/bedwatch")).unwrap();
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = ServiceConfig::default();
        config.alerting.warning_threshold = 50.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let mut config = ServiceConfig::default();
        config.ledger.retention_depth = 0;
        assert!(config.validate().is_err());
    }
}
