//! Intelligent request routing
//!
//! The router composes the health registry, per-backend circuit breakers,
//! cost model, specialization classifier, load balancer, and decision cache
//! into a single synchronous `route` call: a bounded computation with no
//! network I/O, no suspension point, and no internal retries. Dispatch and
//! retry policy belong to the caller, which reports results back through
//! `record_outcome`.

use std::sync::Arc;
use std::time::Instant;

pub mod decision;
pub mod error;

pub use decision::{CandidateSnapshot, DecisionSnapshot, RoutingDecision, RoutingRequest};
pub use error::RoutingError;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balancer::{Candidate, LoadBalancer, Selection};
use crate::breaker::{CircuitBreaker, CircuitStatus};
use crate::cache::{self, DecisionCache};
use crate::classify::SpecializationClassifier;
use crate::config::{ConfigError, RouterConfig, RoutingConfig};
use crate::cost::CostModel;
use crate::registry::{BackendInstance, HealthRegistry, RuntimeStateView};

/// How much a full-relevance specialization match multiplies a candidate's
/// weight (bonus = 1 + gain × score). A tunable, not a contract.
const SPECIALIZATION_GAIN: f64 = 1.5;

/// Confidence attached to degraded (timeout-fallback) decisions.
const FALLBACK_CONFIDENCE: f64 = 0.25;

/// Per-backend health/circuit/load status for observability tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatusView {
    pub backend_id: String,
    pub address: String,
    pub tags: Vec<String>,
    pub circuit: CircuitStatus,
    pub runtime: RuntimeStateView,
}

/// The router orchestrates one `route` decision per request.
pub struct Router {
    registry: HealthRegistry,
    breaker: CircuitBreaker,
    cost_model: CostModel,
    classifier: SpecializationClassifier,
    balancer: LoadBalancer,
    cache: DecisionCache,
    routing: RoutingConfig,
}

impl Router {
    /// Build a router from a validated configuration.
    ///
    /// Every configured backend gets exactly one runtime-state slot and one
    /// circuit, seeded here from the same backend list.
    pub fn new(config: RouterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = HealthRegistry::new(&config.backends);
        let breaker = CircuitBreaker::new(
            config.backends.iter().map(|b| b.id.clone()),
            config.breaker.clone(),
        );
        let classifier = SpecializationClassifier::new(&config.classifier);
        let balancer = LoadBalancer::new(config.routing.cost_preference);
        let cache = DecisionCache::new(
            config.routing.cache_ttl(),
            config.routing.cache_max_entries,
        );

        Ok(Self {
            registry,
            breaker,
            cost_model: CostModel::new(),
            classifier,
            balancer,
            cache,
            routing: config.routing,
        })
    }

    /// Health registry handle for the external probe source.
    pub fn registry(&self) -> &HealthRegistry {
        &self.registry
    }

    /// Circuit breaker handle for maintenance tooling.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Route a request to a backend.
    ///
    /// Every `Ok` decision reserves one in-flight slot on the selected
    /// backend and must be matched by exactly one `record_outcome` call once
    /// the dispatch completes or times out.
    pub fn route(&self, request: &RoutingRequest) -> Result<RoutingDecision, RoutingError> {
        self.route_with_cancellation(request, &CancellationToken::new())
    }

    /// Route a request, abandoning the computation if `cancel` fires.
    ///
    /// Cancellation is checked cooperatively at phase boundaries; a cancelled
    /// call returns `Cancelled` without having mutated shared state.
    pub fn route_with_cancellation(
        &self,
        request: &RoutingRequest,
        cancel: &CancellationToken,
    ) -> Result<RoutingDecision, RoutingError> {
        if cancel.is_cancelled() {
            return Err(RoutingError::Cancelled);
        }
        let deadline = Instant::now() + self.routing.decision_timeout();
        let signature = cache::signature(request);

        // Cache hit is only reusable while the referenced backend is still
        // circuit-eligible; a backend can open (or exhaust its trial slots)
        // between write and read.
        if let Some(hit) = self.cache.get(signature) {
            if self.breaker.is_eligible(&hit.backend_id) && self.try_commit(&hit.backend_id) {
                debug!(
                    request_id = %request.id,
                    backend_id = %hit.backend_id,
                    "decision served from cache"
                );
                return Ok(hit);
            }
            self.cache.invalidate(signature);
            debug!(
                request_id = %request.id,
                backend_id = %hit.backend_id,
                "cached decision dropped: backend no longer admissible"
            );
        }

        // Filter to healthy, circuit-admitted backends.
        let eligible: Vec<Arc<BackendInstance>> = self
            .registry
            .instances()
            .iter()
            .filter(|b| self.breaker.is_eligible(&b.id) && self.registry.is_healthy(&b.id))
            .cloned()
            .collect();
        if eligible.is_empty() {
            if Instant::now() >= deadline {
                return Err(RoutingError::DecisionTimeout {
                    budget_ms: self.routing.decision_timeout_ms,
                });
            }
            return Err(RoutingError::NoEligibleBackend);
        }

        // Budget filter runs before selection so an over-budget backend can
        // never win, and an emptied set fails loudly instead of silently
        // ignoring the ceiling.
        let mut priced: Vec<(Arc<BackendInstance>, f64)> = eligible
            .into_iter()
            .map(|b| {
                let estimate = self.cost_model.estimate(&b, request.size_hint);
                (b, estimate)
            })
            .collect();
        if let Some(ceiling) = request.budget_ceiling {
            let cheapest = priced
                .iter()
                .map(|(_, cost)| *cost)
                .fold(f64::INFINITY, f64::min);
            priced.retain(|(_, cost)| self.cost_model.within_budget(*cost, Some(ceiling)));
            if priced.is_empty() {
                return Err(RoutingError::BudgetExceeded { ceiling, cheapest });
            }
        }

        if cancel.is_cancelled() {
            return Err(RoutingError::Cancelled);
        }

        // Past the decision budget: degrade to an unweighted pick instead of
        // spending more time on classification and scoring.
        if Instant::now() >= deadline {
            return self
                .fallback_decision(request, &priced)
                .ok_or(RoutingError::NoEligibleBackend);
        }

        // Classification and specialization bonus.
        let tag_scores = self.classifier.classify(request);
        let relevant: Vec<(String, f64)> = tag_scores
            .into_iter()
            .filter(|(_, score)| *score >= self.routing.relevance_threshold)
            .collect();

        let mut candidates: Vec<Candidate> = priced
            .iter()
            .map(|(instance, estimated_cost)| Candidate {
                instance: Arc::clone(instance),
                load_factor: self.registry.load_factor(&instance.id).unwrap_or(0.0),
                in_flight: self.registry.in_flight(&instance.id).unwrap_or(0),
                specialization_bonus: specialization_bonus(instance, &relevant).0,
                estimated_cost: *estimated_cost,
            })
            .collect();

        if Instant::now() >= deadline {
            return self
                .fallback_decision(request, &priced)
                .ok_or(RoutingError::NoEligibleBackend);
        }

        // A selected backend can lose its last half-open trial slot to a
        // concurrent decision between filtering and commit; drop it and
        // redraw from the remaining candidates.
        let decision = loop {
            let selection = self
                .balancer
                .select(&candidates)
                .ok_or(RoutingError::NoEligibleBackend)?;

            if cancel.is_cancelled() {
                return Err(RoutingError::Cancelled);
            }

            if self.try_commit(&candidates[selection.index].instance.id) {
                break self.build_decision(&candidates, &selection, &relevant);
            }
            candidates.remove(selection.index);
        };
        self.cache.put(signature, decision.clone());
        info!(
            request_id = %request.id,
            backend_id = %decision.backend_id,
            confidence = decision.confidence,
            estimated_cost = decision.estimated_cost,
            "routing decision"
        );
        Ok(decision)
    }

    /// Report the outcome of a dispatched request.
    ///
    /// Fire-and-forget: updates registry counters and circuit state for
    /// future decisions and never propagates an error. A dispatch timeout is
    /// reported as `success = false`.
    pub fn record_outcome(&self, backend_id: &str, success: bool, latency_ms: u32) {
        if self.registry.end_dispatch(backend_id).is_err() {
            warn!(backend_id = %backend_id, "outcome reported for unknown backend");
            return;
        }
        let _ = self.registry.record_dispatch(backend_id, latency_ms, success);
        self.breaker.record_outcome(backend_id, success);
    }

    /// Read-only per-backend health/circuit/load status, in registration
    /// order.
    pub fn status_snapshot(&self) -> Vec<BackendStatusView> {
        let mut runtime = self.registry.snapshot();
        self.registry
            .instances()
            .iter()
            .filter_map(|instance| {
                let runtime = runtime.remove(&instance.id)?;
                Some(BackendStatusView {
                    backend_id: instance.id.clone(),
                    address: instance.address.clone(),
                    tags: instance.tags.clone(),
                    circuit: self
                        .breaker
                        .status(&instance.id)
                        .unwrap_or(CircuitStatus::Closed),
                    runtime,
                })
            })
            .collect()
    }

    /// Reserve the decision on the chosen backend: an atomic circuit
    /// admission (a bounded trial slot while half-open), plus one in-flight
    /// slot in the registry. Returns false without touching the registry if
    /// the circuit refuses.
    fn try_commit(&self, backend_id: &str) -> bool {
        if !self.breaker.try_admit(backend_id) {
            return false;
        }
        let _ = self.registry.begin_dispatch(backend_id);
        true
    }

    fn build_decision(
        &self,
        candidates: &[Candidate],
        selection: &Selection,
        relevant: &[(String, f64)],
    ) -> RoutingDecision {
        let chosen = &candidates[selection.index];
        let chosen_weight = selection.effective_weights[selection.index];
        let confidence = if selection.total_weight > 0.0 {
            (chosen_weight / selection.total_weight).clamp(0.0, 1.0)
        } else {
            1.0 / candidates.len() as f64
        };

        let specialization = specialization_bonus(&chosen.instance, relevant).1;
        let reasoning = match &specialization {
            Some((tag, score)) => format!(
                "selected '{}' from {} candidate(s): weight {:.3}/{:.3}, load {:.2}, \
                 est cost {:.4}, specialization {}({:.2})",
                chosen.instance.id,
                candidates.len(),
                chosen_weight,
                selection.total_weight,
                chosen.load_factor,
                chosen.estimated_cost,
                tag,
                score,
            ),
            None => format!(
                "selected '{}' from {} candidate(s): weight {:.3}/{:.3}, load {:.2}, \
                 est cost {:.4}",
                chosen.instance.id,
                candidates.len(),
                chosen_weight,
                selection.total_weight,
                chosen.load_factor,
                chosen.estimated_cost,
            ),
        };

        RoutingDecision {
            backend_id: chosen.instance.id.clone(),
            address: chosen.instance.address.clone(),
            confidence,
            reasoning,
            estimated_cost: chosen.estimated_cost,
            snapshot: self.snapshot_candidates(candidates, &selection.effective_weights),
        }
    }

    /// Best-effort unweighted pick used when the decision budget is spent:
    /// the least-loaded in-budget candidate, ties broken by id. Deliberately
    /// not written to the cache, so a degraded pick is never replayed for a
    /// whole TTL.
    fn fallback_decision(
        &self,
        request: &RoutingRequest,
        priced: &[(Arc<BackendInstance>, f64)],
    ) -> Option<RoutingDecision> {
        let mut ordered: Vec<&(Arc<BackendInstance>, f64)> = priced.iter().collect();
        ordered.sort_by(|(a, _), (b, _)| {
            let a_in_flight = self.registry.in_flight(&a.id).unwrap_or(0);
            let b_in_flight = self.registry.in_flight(&b.id).unwrap_or(0);
            a_in_flight.cmp(&b_in_flight).then_with(|| a.id.cmp(&b.id))
        });
        let (instance, estimated_cost) = ordered
            .into_iter()
            .find(|(instance, _)| self.try_commit(&instance.id))?;

        warn!(
            request_id = %request.id,
            backend_id = %instance.id,
            budget_ms = self.routing.decision_timeout_ms,
            "decision budget exceeded, degrading to unweighted pick"
        );

        let candidates: Vec<Candidate> = priced
            .iter()
            .map(|(b, cost)| Candidate {
                instance: Arc::clone(b),
                load_factor: self.registry.load_factor(&b.id).unwrap_or(0.0),
                in_flight: self.registry.in_flight(&b.id).unwrap_or(0),
                specialization_bonus: 1.0,
                estimated_cost: *cost,
            })
            .collect();
        let uniform = vec![1.0; candidates.len()];

        Some(RoutingDecision {
            backend_id: instance.id.clone(),
            address: instance.address.clone(),
            confidence: FALLBACK_CONFIDENCE,
            reasoning: format!(
                "decision budget of {}ms exceeded: unweighted pick of least-loaded \
                 eligible backend '{}'",
                self.routing.decision_timeout_ms, instance.id,
            ),
            estimated_cost: *estimated_cost,
            snapshot: self.snapshot_candidates(&candidates, &uniform),
        })
    }

    fn snapshot_candidates(
        &self,
        candidates: &[Candidate],
        effective_weights: &[f64],
    ) -> DecisionSnapshot {
        DecisionSnapshot {
            cost_preference: self.routing.cost_preference,
            candidates: candidates
                .iter()
                .zip(effective_weights)
                .map(|(candidate, &weight)| CandidateSnapshot {
                    backend_id: candidate.instance.id.clone(),
                    circuit: self
                        .breaker
                        .status(&candidate.instance.id)
                        .unwrap_or(CircuitStatus::Closed),
                    load_factor: candidate.load_factor,
                    in_flight: candidate.in_flight,
                    estimated_cost: candidate.estimated_cost,
                    effective_weight: weight,
                })
                .collect(),
        }
    }
}

/// Bonus multiplier for a backend whose declared tags intersect the relevant
/// classification tags; 1.0 when nothing matches. Also returns the matched
/// (tag, score) for decision reasoning.
fn specialization_bonus(
    instance: &BackendInstance,
    relevant: &[(String, f64)],
) -> (f64, Option<(String, f64)>) {
    let best = relevant
        .iter()
        .filter(|(tag, _)| instance.has_tag(tag))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    match best {
        Some((tag, score)) => (1.0 + SPECIALIZATION_GAIN * score, Some((tag.clone(), *score))),
        None => (1.0, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RouterConfig};

    fn backend(id: &str, tags: &[&str], weight: u32, cost: f64) -> BackendConfig {
        BackendConfig {
            id: id.to_string(),
            address: format!("http://{}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            weight,
            cost_per_token: cost,
            concurrency_limit: 8,
        }
    }

    fn router(backends: Vec<BackendConfig>) -> Router {
        let config = RouterConfig {
            backends,
            ..RouterConfig::default()
        };
        Router::new(config).unwrap()
    }

    #[test]
    fn routes_to_a_configured_backend() {
        let router = router(vec![
            backend("a", &["general"], 1, 0.001),
            backend("b", &["general"], 1, 0.001),
        ]);
        let request = RoutingRequest::new("summarize this document", 200);

        let decision = router.route(&request).unwrap();
        assert!(decision.backend_id == "a" || decision.backend_id == "b");
        assert!((0.0..=1.0).contains(&decision.confidence));
        assert_eq!(decision.snapshot.candidates.len(), 2);
    }

    #[test]
    fn decision_reserves_an_in_flight_slot() {
        let router = router(vec![backend("a", &[], 1, 0.001)]);
        let request = RoutingRequest::new("hello", 10);

        router.route(&request).unwrap();
        assert_eq!(router.registry().in_flight("a").unwrap(), 1);

        router.record_outcome("a", true, 25);
        assert_eq!(router.registry().in_flight("a").unwrap(), 0);
    }

    #[test]
    fn empty_registry_yields_no_eligible_backend() {
        let router = router(vec![]);
        let request = RoutingRequest::new("hello", 10);

        assert!(matches!(
            router.route(&request),
            Err(RoutingError::NoEligibleBackend)
        ));
    }

    #[test]
    fn unhealthy_backend_is_filtered() {
        let router = router(vec![backend("a", &[], 1, 0.001)]);
        router.registry().report_health("a", 5_000, false).unwrap();

        let request = RoutingRequest::new("hello", 10);
        assert!(matches!(
            router.route(&request),
            Err(RoutingError::NoEligibleBackend)
        ));
    }

    #[test]
    fn budget_exceeded_when_ceiling_below_all_estimates() {
        let router = router(vec![
            backend("a", &[], 1, 0.01),
            backend("b", &[], 1, 0.02),
        ]);
        // cheapest estimate is 0.01 × 100 = 1.0
        let request = RoutingRequest::new("hello", 100).with_budget(0.5);

        match router.route(&request) {
            Err(RoutingError::BudgetExceeded { ceiling, cheapest }) => {
                assert_eq!(ceiling, 0.5);
                assert_eq!(cheapest, 1.0);
            }
            other => panic!("expected BudgetExceeded, got {:?}", other.map(|d| d.backend_id)),
        }
    }

    #[test]
    fn budget_filter_removes_only_over_ceiling_candidates() {
        let router = router(vec![
            backend("cheap", &[], 1, 0.001),
            backend("pricey", &[], 100, 0.1),
        ]);
        // pricey estimates 10.0, cheap estimates 0.1
        let request = RoutingRequest::new("hello", 100).with_budget(1.0);

        for _ in 0..10 {
            let decision = router.route(&request).unwrap();
            assert_eq!(decision.backend_id, "cheap");
            router.record_outcome("cheap", true, 20);
        }
    }

    #[test]
    fn cancellation_before_routing_returns_cancelled() {
        let router = router(vec![backend("a", &[], 1, 0.001)]);
        let request = RoutingRequest::new("hello", 10);

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            router.route_with_cancellation(&request, &cancel),
            Err(RoutingError::Cancelled)
        ));
        // no shared state was mutated
        assert_eq!(router.registry().in_flight("a").unwrap(), 0);
    }

    #[test]
    fn zero_decision_budget_degrades_to_unweighted_pick() {
        let mut config = RouterConfig {
            backends: vec![
                backend("a", &["coding"], 5, 0.001),
                backend("b", &[], 1, 0.001),
            ],
            ..RouterConfig::default()
        };
        config.routing.decision_timeout_ms = 0;
        let router = Router::new(config).unwrap();

        let request = RoutingRequest::new("fix this code", 100).with_kind("coding");
        let decision = router.route(&request).unwrap();

        // least-loaded pick, ties broken by id
        assert_eq!(decision.backend_id, "a");
        assert_eq!(decision.confidence, FALLBACK_CONFIDENCE);
        assert!(decision.reasoning.contains("unweighted"));
    }

    #[test]
    fn zero_budget_with_all_circuits_open_times_out() {
        let mut config = RouterConfig {
            backends: vec![backend("a", &[], 1, 0.001)],
            ..RouterConfig::default()
        };
        config.routing.decision_timeout_ms = 0;
        config.breaker.failure_threshold = 1;
        let router = Router::new(config).unwrap();

        router.breaker().trip("a");
        let request = RoutingRequest::new("hello", 10);
        assert!(matches!(
            router.route(&request),
            Err(RoutingError::DecisionTimeout { budget_ms: 0 })
        ));
    }

    #[test]
    fn record_outcome_for_unknown_backend_is_a_noop() {
        let router = router(vec![backend("a", &[], 1, 0.001)]);
        // must not panic or alter known state
        router.record_outcome("ghost", false, 10);
        assert_eq!(router.registry().in_flight("a").unwrap(), 0);
    }

    #[test]
    fn status_snapshot_covers_every_backend() {
        let router = router(vec![
            backend("a", &["coding"], 1, 0.001),
            backend("b", &["chat"], 1, 0.001),
        ]);
        router.breaker().trip("b");

        let snapshot = router.status_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].backend_id, "a");
        assert_eq!(snapshot[0].circuit, CircuitStatus::Closed);
        assert_eq!(snapshot[1].circuit, CircuitStatus::Open);

        // serializable for observability tooling
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json[1]["circuit"], "open");
    }
}
