//! Routing request and decision types.
//!
//! Both are plain immutable value types: a request is never mutated after
//! construction, and a decision is produced once per routed request.

use serde::{Deserialize, Serialize};

use crate::breaker::CircuitStatus;
use crate::config::CostPreference;

/// Immutable routing input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRequest {
    /// Unique request id for tracing
    pub id: String,
    /// Content/metadata digest used for specialization scoring; normalized,
    /// never the raw payload
    pub content_digest: String,
    /// Token-count proxy for cost estimation (e.g., derived from content
    /// length)
    pub size_hint: u32,
    /// Declared budget ceiling, if any
    pub budget_ceiling: Option<f64>,
    /// Request-type hint (e.g., "coding"), if the caller knows it
    pub kind_hint: Option<String>,
}

impl RoutingRequest {
    /// Create a request with a fresh trace id.
    pub fn new(content_digest: impl Into<String>, size_hint: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_digest: content_digest.into(),
            size_hint,
            budget_ceiling: None,
            kind_hint: None,
        }
    }

    /// Declare a budget ceiling for this request.
    pub fn with_budget(mut self, ceiling: f64) -> Self {
        self.budget_ceiling = Some(ceiling);
        self
    }

    /// Attach a request-type hint.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind_hint = Some(kind.into());
        self
    }
}

/// One candidate's state at decision time, kept for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub backend_id: String,
    pub circuit: CircuitStatus,
    pub load_factor: f64,
    pub in_flight: u32,
    pub estimated_cost: f64,
    pub effective_weight: f64,
}

/// The circuit/load picture the decision was made from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    pub cost_preference: CostPreference,
    pub candidates: Vec<CandidateSnapshot>,
}

/// Immutable routing output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Selected backend id
    pub backend_id: String,
    /// Network address of the selected backend, for dispatch
    pub address: String,
    /// Confidence in the selection, 0–1
    pub confidence: f64,
    /// Human-readable explanation of the selection
    pub reasoning: String,
    /// Estimated cost of serving the request on the selected backend
    pub estimated_cost: f64,
    /// Candidate state used to make the decision
    pub snapshot: DecisionSnapshot,
}
