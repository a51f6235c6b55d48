//! Load balancer.
//!
//! Weighted round robin with live-load adjustment: each candidate's static
//! weight is scaled down by its current load factor, scaled up by its
//! specialization bonus, and scaled down by its normalized cost according to
//! the configured cost preference. Selection is a single weighted-random
//! draw over the adjusted weights rather than strict rotation, so concurrent
//! callers do not herd onto one backend.

use std::sync::Arc;

use rand::Rng;

use crate::config::CostPreference;
use crate::registry::BackendInstance;

/// Relative tolerance when deciding that all effective weights are equal.
const WEIGHT_EPSILON: f64 = 1e-9;

/// Floor for the cost scaling factor so an expensive backend is deprioritized,
/// never starved.
const MIN_COST_SCALE: f64 = 0.05;

/// One backend under consideration, with the live signals attached by the
/// router at decision time.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub instance: Arc<BackendInstance>,
    /// In-flight count normalized against the concurrency ceiling
    pub load_factor: f64,
    /// Raw in-flight count, used for tie-breaking
    pub in_flight: u32,
    /// Multiplier ≥ 1.0 from specialization matching
    pub specialization_bonus: f64,
    /// Estimated cost for this request on this backend
    pub estimated_cost: f64,
}

/// Outcome of a weighted draw: the chosen index plus the effective weights
/// that produced it, kept for decision auditing.
#[derive(Debug)]
pub struct Selection {
    pub index: usize,
    pub effective_weights: Vec<f64>,
    pub total_weight: f64,
}

/// Weighted selector over a candidate set.
pub struct LoadBalancer {
    preference: CostPreference,
}

impl LoadBalancer {
    pub fn new(preference: CostPreference) -> Self {
        Self { preference }
    }

    /// How strongly normalized cost scales weights down under this
    /// preference. The exact coefficients are tunables, not contract.
    fn cost_weight(&self) -> f64 {
        match self.preference {
            CostPreference::Cost => 0.8,
            CostPreference::Balanced => 0.4,
            CostPreference::Performance => 0.0,
        }
    }

    /// Effective weights for a candidate set.
    ///
    /// weight = static × 1/(1+load) × specialization × cost scaling, where
    /// cost is normalized against the most expensive candidate in the set.
    pub fn effective_weights(&self, candidates: &[Candidate]) -> Vec<f64> {
        let max_cost = candidates
            .iter()
            .map(|c| c.estimated_cost)
            .fold(0.0_f64, f64::max);

        candidates
            .iter()
            .map(|candidate| {
                let load_scale = 1.0 / (1.0 + candidate.load_factor.max(0.0));
                let cost_scale = if max_cost > 0.0 {
                    (1.0 - self.cost_weight() * (candidate.estimated_cost / max_cost))
                        .max(MIN_COST_SCALE)
                } else {
                    1.0
                };
                f64::from(candidate.instance.weight)
                    * load_scale
                    * candidate.specialization_bonus
                    * cost_scale
            })
            .collect()
    }

    /// Pick one candidate by a single weighted-random draw.
    ///
    /// Tie-break rule: if all effective weights are equal, select the
    /// candidate with the lowest in-flight count, then the lowest backend id,
    /// which keeps selection reproducible under uniform conditions.
    pub fn select(&self, candidates: &[Candidate]) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }

        let effective_weights = self.effective_weights(candidates);
        let total_weight: f64 = effective_weights.iter().sum();

        let index = if all_equal(&effective_weights) || total_weight <= 0.0 {
            lowest_load_index(candidates)
        } else {
            weighted_draw(&effective_weights, total_weight)
        };

        Some(Selection {
            index,
            effective_weights,
            total_weight,
        })
    }
}

fn all_equal(weights: &[f64]) -> bool {
    let Some(&first) = weights.first() else {
        return true;
    };
    let scale = first.abs().max(1.0);
    weights.iter().all(|w| (w - first).abs() <= WEIGHT_EPSILON * scale)
}

/// Deterministic pick: lowest in-flight count, then lowest backend id.
fn lowest_load_index(candidates: &[Candidate]) -> usize {
    candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.in_flight
                .cmp(&b.in_flight)
                .then_with(|| a.instance.id.cmp(&b.instance.id))
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn weighted_draw(weights: &[f64], total: f64) -> usize {
    let pick = rand::thread_rng().gen_range(0.0..total);
    let mut cumulative = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if pick < cumulative {
            return i;
        }
    }
    // float rounding edge: fall back to the last candidate
    weights.len() - 1
}
