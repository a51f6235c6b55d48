use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;

/// A configured backend instance.
///
/// Identity and static routing coefficients for one model-serving endpoint.
/// Immutable after registration; the mutable runtime counters live in the
/// [`HealthRegistry`](crate::registry::HealthRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendInstance {
    /// Stable unique identifier
    pub id: String,
    /// Network address for dispatch
    pub address: String,
    /// Declared capability tags
    pub tags: Vec<String>,
    /// Static base weight for load balancing
    pub weight: u32,
    /// Static cost coefficient per estimated token
    pub cost_per_token: f64,
    /// Concurrency ceiling used to normalize the load factor
    pub concurrency_limit: u32,
}

impl From<&BackendConfig> for BackendInstance {
    fn from(config: &BackendConfig) -> Self {
        Self {
            id: config.id.clone(),
            address: config.address.clone(),
            tags: config.tags.clone(),
            weight: config.weight,
            cost_per_token: config.cost_per_token,
            concurrency_limit: config.concurrency_limit,
        }
    }
}

impl BackendInstance {
    /// Whether this backend declares the given capability tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Serializable view of a backend's runtime state.
///
/// Atomic counters converted to plain values; safe to hand to observability
/// tooling without exposing the registry internals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStateView {
    /// Current in-flight request count
    pub in_flight: u32,
    /// In-flight count normalized against the concurrency ceiling;
    /// values above 1.0 indicate saturation
    pub load_factor: f64,
    /// Rolling average latency in milliseconds (EMA)
    pub avg_latency_ms: u32,
    /// Result of the most recent health report
    pub last_check_ok: bool,
    /// When the most recent failure was reported, if any
    pub last_failure: Option<DateTime<Utc>>,
}
