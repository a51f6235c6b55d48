//! Circuit breaker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker thresholds, shared by all per-backend circuits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures in Closed state before the circuit opens
    pub failure_threshold: u32,
    /// Seconds to wait in Open state before admitting half-open trials
    pub recovery_timeout_secs: u64,
    /// Trial requests admitted while HalfOpen; this many consecutive
    /// successes close the circuit again
    pub half_open_trial_limit: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 30,
            half_open_trial_limit: 3,
        }
    }
}

impl BreakerConfig {
    /// Recovery timeout as a `Duration`
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}
