//! Health Registry module.
//!
//! Tracks liveness and capacity per backend instance from health reports and
//! dispatch accounting. The registry exclusively owns all mutable runtime
//! state; other components read it through this API and never mutate it
//! directly.
//!
//! Backend ids are resolved once to stable indices into fixed-size state
//! arrays, so per-request updates are lock-free atomic operations and
//! unrelated backends never contend.

mod backend;
mod error;
#[cfg(test)]
mod tests;

pub use backend::*;
pub use error::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use crate::config::BackendConfig;

/// Per-backend mutable runtime state.
///
/// All fields are atomics; a slot is only ever touched through registry
/// methods.
#[derive(Debug)]
struct RuntimeSlot {
    in_flight: AtomicU32,
    avg_latency_ms: AtomicU32,
    last_check_ok: AtomicBool,
    /// Unix epoch milliseconds of the last reported failure; 0 = never
    last_failure_ms: AtomicI64,
}

impl RuntimeSlot {
    fn new() -> Self {
        Self {
            in_flight: AtomicU32::new(0),
            avg_latency_ms: AtomicU32::new(0),
            // Optimistic until the first probe says otherwise, so a freshly
            // constructed router can serve traffic before probes arrive.
            last_check_ok: AtomicBool::new(true),
            last_failure_ms: AtomicI64::new(0),
        }
    }
}

/// The Health Registry stores runtime state for every configured backend.
///
/// # Examples
///
/// ```
/// use switchyard::config::BackendConfig;
/// use switchyard::registry::HealthRegistry;
///
/// let registry = HealthRegistry::new(&[BackendConfig {
///     id: "b1".to_string(),
///     address: "http://localhost:8000".to_string(),
///     tags: vec![],
///     weight: 1,
///     cost_per_token: 0.001,
///     concurrency_limit: 4,
/// }]);
///
/// registry.report_health("b1", 42, true).unwrap();
/// assert_eq!(registry.load_factor("b1").unwrap(), 0.0);
/// ```
pub struct HealthRegistry {
    instances: Vec<Arc<BackendInstance>>,
    slots: Vec<RuntimeSlot>,
    index: HashMap<String, usize>,
}

impl HealthRegistry {
    /// Create a registry seeded with the configured backend set.
    ///
    /// The instance set is fixed for the lifetime of the registry; backends
    /// are configured, not discovered.
    pub fn new(backends: &[BackendConfig]) -> Self {
        let instances: Vec<Arc<BackendInstance>> = backends
            .iter()
            .map(|config| Arc::new(BackendInstance::from(config)))
            .collect();
        let slots = instances.iter().map(|_| RuntimeSlot::new()).collect();
        let index = instances
            .iter()
            .enumerate()
            .map(|(i, instance)| (instance.id.clone(), i))
            .collect();

        Self {
            instances,
            slots,
            index,
        }
    }

    fn slot(&self, id: &str) -> Result<&RuntimeSlot, RegistryError> {
        self.index
            .get(id)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| RegistryError::BackendNotFound(id.to_string()))
    }

    /// All configured backend instances, in registration order.
    pub fn instances(&self) -> &[Arc<BackendInstance>] {
        &self.instances
    }

    /// Look up a configured instance by id.
    pub fn instance(&self, id: &str) -> Option<&Arc<BackendInstance>> {
        self.index.get(id).map(|&i| &self.instances[i])
    }

    /// Record the result of a periodic health probe.
    ///
    /// Only probes move the health flag; a backend stays routable through
    /// individual dispatch failures so the circuit breaker, not the health
    /// gate, decides when to isolate it.
    pub fn report_health(
        &self,
        id: &str,
        latency_ms: u32,
        success: bool,
    ) -> Result<(), RegistryError> {
        let slot = self.slot(id)?;
        slot.last_check_ok.store(success, Ordering::SeqCst);
        self.observe(slot, latency_ms, success);
        Ok(())
    }

    /// Record the result of a completed dispatch.
    ///
    /// A dispatch timeout is reported as `success = false`. Latency feeds the
    /// rolling average only on success; failure latencies measure the timeout,
    /// not the backend.
    pub fn record_dispatch(
        &self,
        id: &str,
        latency_ms: u32,
        success: bool,
    ) -> Result<(), RegistryError> {
        let slot = self.slot(id)?;
        self.observe(slot, latency_ms, success);
        Ok(())
    }

    fn observe(&self, slot: &RuntimeSlot, latency_ms: u32, success: bool) {
        if success {
            self.update_latency_slot(slot, latency_ms);
        } else {
            slot.last_failure_ms
                .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
        }
    }

    /// Current in-flight count normalized against the concurrency ceiling.
    ///
    /// Values above 1.0 indicate saturation.
    pub fn load_factor(&self, id: &str) -> Result<f64, RegistryError> {
        let i = *self
            .index
            .get(id)
            .ok_or_else(|| RegistryError::BackendNotFound(id.to_string()))?;
        let in_flight = self.slots[i].in_flight.load(Ordering::SeqCst);
        Ok(f64::from(in_flight) / f64::from(self.instances[i].concurrency_limit))
    }

    /// Current in-flight request count.
    pub fn in_flight(&self, id: &str) -> Result<u32, RegistryError> {
        Ok(self.slot(id)?.in_flight.load(Ordering::SeqCst))
    }

    /// Whether the most recent health report for this backend succeeded.
    pub fn is_healthy(&self, id: &str) -> bool {
        self.slot(id)
            .map(|slot| slot.last_check_ok.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Atomically increment the in-flight counter for a dispatched request.
    ///
    /// Returns the new value after increment.
    pub fn begin_dispatch(&self, id: &str) -> Result<u32, RegistryError> {
        let slot = self.slot(id)?;
        Ok(slot.in_flight.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Atomically decrement the in-flight counter (saturating at 0).
    ///
    /// If already at 0, logs a warning and returns 0.
    pub fn end_dispatch(&self, id: &str) -> Result<u32, RegistryError> {
        let slot = self.slot(id)?;

        loop {
            let current = slot.in_flight.load(Ordering::SeqCst);
            if current == 0 {
                tracing::warn!(
                    backend_id = %id,
                    "attempted to decrement in-flight counter already at 0"
                );
                return Ok(0);
            }

            match slot.in_flight.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(current - 1),
                Err(_) => continue,
            }
        }
    }

    /// Update rolling average latency using EMA: new = (sample + 4*old) / 5.
    ///
    /// Integer math with α=0.2. First sample sets the initial value.
    fn update_latency_slot(&self, slot: &RuntimeSlot, latency_ms: u32) {
        loop {
            let current = slot.avg_latency_ms.load(Ordering::SeqCst);
            let new_val = if current == 0 {
                latency_ms
            } else {
                (latency_ms + 4 * current) / 5
            };

            match slot.avg_latency_ms.compare_exchange(
                current,
                new_val,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    /// Rolling average latency in milliseconds.
    pub fn avg_latency_ms(&self, id: &str) -> Result<u32, RegistryError> {
        Ok(self.slot(id)?.avg_latency_ms.load(Ordering::SeqCst))
    }

    /// Point-in-time view of every backend's runtime state.
    pub fn snapshot(&self) -> HashMap<String, RuntimeStateView> {
        self.instances
            .iter()
            .zip(&self.slots)
            .map(|(instance, slot)| {
                let in_flight = slot.in_flight.load(Ordering::SeqCst);
                let last_failure_ms = slot.last_failure_ms.load(Ordering::SeqCst);
                let view = RuntimeStateView {
                    in_flight,
                    load_factor: f64::from(in_flight) / f64::from(instance.concurrency_limit),
                    avg_latency_ms: slot.avg_latency_ms.load(Ordering::SeqCst),
                    last_check_ok: slot.last_check_ok.load(Ordering::SeqCst),
                    last_failure: (last_failure_ms > 0)
                        .then(|| Utc.timestamp_millis_opt(last_failure_ms).single())
                        .flatten(),
                };
                (instance.id.clone(), view)
            })
            .collect()
    }
}
