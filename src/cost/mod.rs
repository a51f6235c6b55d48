//! Cost model.
//!
//! Maps (backend, request size) to an estimated monetary cost. Deterministic:
//! static per-backend coefficient times a token-count proxy. Cost is a
//! tie-breaking and filtering signal, never the sole selection criterion.

use crate::registry::BackendInstance;

/// Deterministic cost estimator over the static backend coefficients.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostModel;

impl CostModel {
    pub fn new() -> Self {
        Self
    }

    /// Estimated cost of serving a request of `size_hint` tokens on `backend`.
    pub fn estimate(&self, backend: &BackendInstance, size_hint: u32) -> f64 {
        backend.cost_per_token * f64::from(size_hint)
    }

    /// Whether the estimate fits under a declared budget ceiling.
    ///
    /// No ceiling means everything fits.
    pub fn within_budget(&self, estimate: f64, ceiling: Option<f64>) -> bool {
        match ceiling {
            Some(ceiling) => estimate <= ceiling,
            None => true,
        }
    }
}
