//! Per-backend circuit breaker.
//!
//! Isolates a backend after repeated failures and gates whether it is
//! eligible for selection. Transitions never surface as errors; the breaker
//! only changes eligibility and logs the change.
//!
//! ## States
//! - **Closed**: requests admitted normally; consecutive failures counted
//! - **Open**: backend excluded from candidate sets entirely
//! - **HalfOpen**: a bounded number of trial requests admitted to probe
//!   recovery

use std::collections::HashMap;
use std::time::Instant;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;

/// Current status of one backend's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Normal operation, requests flow through
    Closed,
    /// Backend excluded until the recovery timeout elapses
    Open,
    /// Probing recovery with a bounded number of trial requests
    HalfOpen,
}

/// Per-backend circuit state. Mutated only inside the map's entry lock,
/// which gives single-writer discipline per backend id.
#[derive(Debug)]
struct CircuitState {
    status: CircuitStatus,
    consecutive_failures: u32,
    last_transition: Instant,
    /// Trial requests currently admitted while HalfOpen
    trials_in_flight: u32,
    /// Consecutive trial successes while HalfOpen
    trial_successes: u32,
}

impl CircuitState {
    fn new() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            last_transition: Instant::now(),
            trials_in_flight: 0,
            trial_successes: 0,
        }
    }

    fn transition(&mut self, status: CircuitStatus) {
        self.status = status;
        self.last_transition = Instant::now();
        self.trials_in_flight = 0;
        self.trial_successes = 0;
    }
}

/// Circuit breaker map covering every configured backend.
///
/// One circuit per backend id, seeded at construction; the set never changes
/// afterwards. All state lives behind per-entry locks so unrelated backends
/// never contend.
pub struct CircuitBreaker {
    circuits: DashMap<String, CircuitState>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    /// Create a breaker with a Closed circuit for each backend id.
    pub fn new<I, S>(backend_ids: I, config: BreakerConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let circuits = DashMap::new();
        for id in backend_ids {
            circuits.insert(id.into(), CircuitState::new());
        }
        Self { circuits, config }
    }

    /// Whether the backend may receive a request right now.
    ///
    /// Performs the lazy Open→HalfOpen promotion once the recovery timeout
    /// has elapsed. While HalfOpen this is only an advisory read for
    /// candidate filtering; the binding reservation of a trial slot is
    /// `try_admit`, so two callers passing this gate cannot both dispatch
    /// past the trial limit.
    pub fn is_eligible(&self, backend_id: &str) -> bool {
        let Some(mut circuit) = self.circuits.get_mut(backend_id) else {
            return false;
        };

        match circuit.status {
            CircuitStatus::Closed => true,
            CircuitStatus::Open => {
                if circuit.last_transition.elapsed() >= self.config.recovery_timeout() {
                    circuit.transition(CircuitStatus::HalfOpen);
                    info!(
                        backend_id = %backend_id,
                        "circuit half-open: admitting trial requests"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitStatus::HalfOpen => circuit.trials_in_flight < self.config.half_open_trial_limit,
        }
    }

    /// Atomically reserve the right to dispatch to a backend.
    ///
    /// Called by the router once per decision, at commit time. Closed
    /// circuits always admit. HalfOpen circuits check the trial limit and
    /// increment the trial counter under the same entry lock, so concurrent
    /// callers can never over-admit; the slot is released by
    /// `record_outcome`. Open and unknown circuits refuse.
    pub fn try_admit(&self, backend_id: &str) -> bool {
        let Some(mut circuit) = self.circuits.get_mut(backend_id) else {
            return false;
        };

        match circuit.status {
            CircuitStatus::Closed => true,
            CircuitStatus::Open => false,
            CircuitStatus::HalfOpen => {
                if circuit.trials_in_flight < self.config.half_open_trial_limit {
                    circuit.trials_in_flight += 1;
                    debug!(
                        backend_id = %backend_id,
                        trials_in_flight = circuit.trials_in_flight,
                        "half-open trial admitted"
                    );
                    true
                } else {
                    debug!(backend_id = %backend_id, "half-open trial slots exhausted");
                    false
                }
            }
        }
    }

    /// Record a dispatch outcome and apply any due transition.
    ///
    /// Never errors: unknown ids are ignored with a warning, and transitions
    /// are routine state changes, not failures.
    pub fn record_outcome(&self, backend_id: &str, success: bool) {
        let Some(mut circuit) = self.circuits.get_mut(backend_id) else {
            warn!(backend_id = %backend_id, "outcome reported for unknown backend");
            return;
        };

        match (circuit.status, success) {
            (CircuitStatus::Closed, true) => {
                circuit.consecutive_failures = 0;
            }
            (CircuitStatus::Closed, false) => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    circuit.transition(CircuitStatus::Open);
                    warn!(
                        backend_id = %backend_id,
                        failures = self.config.failure_threshold,
                        "circuit opened: consecutive failure threshold reached"
                    );
                }
            }
            (CircuitStatus::HalfOpen, true) => {
                circuit.trials_in_flight = circuit.trials_in_flight.saturating_sub(1);
                circuit.trial_successes += 1;
                if circuit.trial_successes >= self.config.half_open_trial_limit {
                    circuit.transition(CircuitStatus::Closed);
                    circuit.consecutive_failures = 0;
                    info!(backend_id = %backend_id, "circuit closed: backend recovered");
                }
            }
            (CircuitStatus::HalfOpen, false) => {
                circuit.transition(CircuitStatus::Open);
                warn!(backend_id = %backend_id, "circuit reopened: half-open trial failed");
            }
            (CircuitStatus::Open, _) => {
                // Late outcome from a request admitted before the circuit
                // opened; eligibility is already decided.
                debug!(backend_id = %backend_id, success, "outcome ignored while open");
            }
        }
    }

    /// Current status of one circuit.
    pub fn status(&self, backend_id: &str) -> Option<CircuitStatus> {
        self.circuits.get(backend_id).map(|circuit| circuit.status)
    }

    /// Point-in-time status of every circuit.
    pub fn snapshot(&self) -> HashMap<String, CircuitStatus> {
        self.circuits
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status))
            .collect()
    }

    /// Force a circuit open (maintenance tooling).
    pub fn trip(&self, backend_id: &str) {
        if let Some(mut circuit) = self.circuits.get_mut(backend_id) {
            circuit.transition(CircuitStatus::Open);
            warn!(backend_id = %backend_id, "circuit manually tripped to open");
        }
    }

    /// Force a circuit closed and clear its counters (maintenance tooling).
    pub fn reset(&self, backend_id: &str) {
        if let Some(mut circuit) = self.circuits.get_mut(backend_id) {
            circuit.transition(CircuitStatus::Closed);
            circuit.consecutive_failures = 0;
            info!(backend_id = %backend_id, "circuit manually reset to closed");
        }
    }
}
