//! Routing configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Budget-sensitivity preference for the load balancer.
///
/// Controls how strongly estimated cost scales a candidate's effective
/// weight down relative to its live load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostPreference {
    /// Weigh cost heavily; cheaper backends win under equal load
    Cost,
    /// Ignore cost entirely; load and specialization decide
    Performance,
    /// Weigh load and cost equally
    #[default]
    Balanced,
}

impl FromStr for CostPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cost" => Ok(CostPreference::Cost),
            "performance" => Ok(CostPreference::Performance),
            "balanced" => Ok(CostPreference::Balanced),
            _ => Err(format!("Unknown cost preference: {}", s)),
        }
    }
}

impl std::fmt::Display for CostPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostPreference::Cost => write!(f, "cost"),
            CostPreference::Performance => write!(f, "performance"),
            CostPreference::Balanced => write!(f, "balanced"),
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Budget-sensitivity preference
    pub cost_preference: CostPreference,
    /// Worst-case budget for a single routing decision; exceeding it
    /// degrades to an unweighted eligible-candidate pick
    pub decision_timeout_ms: u64,
    /// How long a cached decision stays reusable
    pub cache_ttl_ms: u64,
    /// Hard bound on cached decisions; oldest-inserted entries are evicted
    pub cache_max_entries: usize,
    /// Minimum classification score for a tag to grant a specialization
    /// bonus; below this all backends are treated as equally generic
    pub relevance_threshold: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cost_preference: CostPreference::Balanced,
            decision_timeout_ms: 10,
            cache_ttl_ms: 2_000,
            cache_max_entries: 1_024,
            relevance_threshold: 0.3,
        }
    }
}

impl RoutingConfig {
    /// Decision timeout as a `Duration`
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    /// Cache TTL as a `Duration`
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RoutingConfig::default();
        assert_eq!(config.cost_preference, CostPreference::Balanced);
        assert_eq!(config.decision_timeout_ms, 10);
        assert_eq!(config.cache_max_entries, 1_024);
    }

    #[test]
    fn cost_preference_serde() {
        let pref = CostPreference::Performance;
        let json = serde_json::to_string(&pref).unwrap();
        assert_eq!(json, "\"performance\"");
    }

    #[test]
    fn cost_preference_from_str() {
        assert_eq!("cost".parse::<CostPreference>().unwrap(), CostPreference::Cost);
        assert_eq!(
            "Balanced".parse::<CostPreference>().unwrap(),
            CostPreference::Balanced
        );
        assert!("cheapest".parse::<CostPreference>().is_err());
    }
}
