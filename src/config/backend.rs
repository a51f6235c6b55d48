//! Static backend registry configuration

use serde::{Deserialize, Serialize};

fn default_weight() -> u32 {
    1
}

fn default_concurrency_limit() -> u32 {
    8
}

/// Declaration of a single backend instance.
///
/// The set of backends is configured, not discovered: every instance the
/// router may select must appear here. Fields are immutable after the router
/// is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Stable unique identifier
    pub id: String,
    /// Network address for dispatch (e.g., "http://10.0.0.5:8000")
    pub address: String,
    /// Declared capability tags (e.g., "general", "coding", "chat")
    #[serde(default)]
    pub tags: Vec<String>,
    /// Static base weight for load balancing (higher = preferred)
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Static cost coefficient per estimated token
    #[serde(default)]
    pub cost_per_token: f64,
    /// Concurrency ceiling used to normalize the load factor
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: u32,
}
