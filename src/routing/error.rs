//! Error types for routing failures

use thiserror::Error;

/// Errors that can occur during a routing decision.
///
/// All variants are recoverable at the caller: the documented policy is
/// caller-side retry with a new routing call, never internal retries.
/// Circuit-breaker transitions and backend dispatch failures are not errors;
/// they only change state for future decisions.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Every candidate was filtered out by circuit state or health
    #[error("no eligible backend: all candidates filtered by circuit state or health")]
    NoEligibleBackend,

    /// The declared budget ceiling removed every candidate
    #[error("budget ceiling {ceiling} below cheapest candidate estimate {cheapest}")]
    BudgetExceeded { ceiling: f64, cheapest: f64 },

    /// The decision exceeded its latency budget and no best-effort pick was
    /// possible
    #[error("routing decision exceeded {budget_ms}ms budget with no candidate to fall back to")]
    DecisionTimeout { budget_ms: u64 },

    /// The caller cancelled before a decision was reached
    #[error("routing cancelled by caller")]
    Cancelled,
}
