//! Configuration module for Switchyard
//!
//! Every recognized option is a named field on an explicit struct, validated
//! once at construction time. There is no dynamic key/value settings bag.
//!
//! # Configuration Precedence
//!
//! 1. Environment variables (`SWITCHYARD_*`)
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! # Example
//!
//! ```rust
//! use switchyard::config::RouterConfig;
//!
//! let toml = r#"
//! [breaker]
//! failure_threshold = 3
//!
//! [[backends]]
//! id = "b1"
//! address = "http://localhost:8000"
//! "#;
//! let config: RouterConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.breaker.failure_threshold, 3);
//! ```

pub mod backend;
pub mod breaker;
pub mod classifier;
pub mod error;
pub mod logging;
pub mod routing;

pub use backend::BackendConfig;
pub use breaker::BreakerConfig;
pub use classifier::ClassifierConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use routing::{CostPreference, RoutingConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Unified configuration for the request router.
///
/// Aggregates the circuit breaker thresholds, routing knobs, classifier
/// signals, the static backend registry, and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Circuit breaker thresholds
    pub breaker: BreakerConfig,
    /// Routing and decision-cache settings
    pub routing: RoutingConfig,
    /// Specialization classifier signals
    pub classifier: ClassifierConfig,
    /// Static backend definitions
    pub backends: Vec<BackendConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supports SWITCHYARD_* variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("SWITCHYARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SWITCHYARD_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(pref) = std::env::var("SWITCHYARD_COST_PREFERENCE") {
            if let Ok(p) = pref.parse() {
                self.routing.cost_preference = p;
            }
        }
        if let Ok(timeout) = std::env::var("SWITCHYARD_DECISION_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.routing.decision_timeout_ms = t;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::Validation {
                field: "breaker.failure_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.breaker.half_open_trial_limit == 0 {
            return Err(ConfigError::Validation {
                field: "breaker.half_open_trial_limit".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.routing.relevance_threshold) {
            return Err(ConfigError::Validation {
                field: "routing.relevance_threshold".to_string(),
                message: "must be within [0.0, 1.0]".to_string(),
            });
        }
        if self.routing.cache_max_entries == 0 {
            return Err(ConfigError::Validation {
                field: "routing.cache_max_entries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (i, backend) in self.backends.iter().enumerate() {
            if backend.id.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].id", i),
                    message: "id cannot be empty".to_string(),
                });
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigError::DuplicateBackend(backend.id.clone()));
            }
            if backend.address.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].address", i),
                    message: "address cannot be empty".to_string(),
                });
            }
            if backend.weight == 0 {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].weight", i),
                    message: "weight must be at least 1".to_string(),
                });
            }
            if backend.concurrency_limit == 0 {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].concurrency_limit", i),
                    message: "concurrency limit must be at least 1".to_string(),
                });
            }
            if backend.cost_per_token < 0.0 {
                return Err(ConfigError::Validation {
                    field: format!("backends[{}].cost_per_token", i),
                    message: "cost coefficient cannot be negative".to_string(),
                });
            }
        }

        Ok(())
    }
}
