//! Routing decision cache.
//!
//! Memoizes recent identical-signature decisions for a short TTL to bound
//! decision latency under bursty, repetitive traffic. The cache itself only
//! handles expiry and capacity; circuit-liveness revalidation of a hit is the
//! router's job, because a backend can open between the write and a later
//! read.

use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::routing::{RoutingDecision, RoutingRequest};

/// Requests whose size hints land in the same bucket share a signature.
const SIZE_BUCKET: u32 = 64;

struct CacheEntry {
    decision: RoutingDecision,
    inserted: Instant,
}

/// TTL-bounded decision cache with a max-entry safety valve.
///
/// Eviction is time-based; when the entry bound is hit, the
/// least-recently-inserted entry is dropped first.
pub struct DecisionCache {
    entries: DashMap<u64, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl DecisionCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Look up a cached decision; expired entries are removed on read.
    pub fn get(&self, signature: u64) -> Option<RoutingDecision> {
        let expired = match self.entries.get(&signature) {
            Some(entry) => {
                if entry.inserted.elapsed() < self.ttl {
                    return Some(entry.decision.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(&signature);
        }
        None
    }

    /// Insert a decision, evicting the oldest entry if at capacity.
    pub fn put(&self, signature: u64, decision: RoutingDecision) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&signature) {
            self.evict_oldest();
        }
        self.entries.insert(
            signature,
            CacheEntry {
                decision,
                inserted: Instant::now(),
            },
        );
    }

    /// Drop an entry whose referenced backend is no longer eligible.
    pub fn invalidate(&self, signature: u64) {
        self.entries.remove(&signature);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted)
            .map(|entry| *entry.key());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

/// Signature over the normalized routing-relevant request fields.
///
/// Covers the content digest, a bucketed size hint, the kind hint, and the
/// budget ceiling. Never raw content, and never the per-request trace id,
/// which would defeat memoization.
pub fn signature(request: &RoutingRequest) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    request.content_digest.hash(&mut hasher);
    (request.size_hint / SIZE_BUCKET).hash(&mut hasher);
    request.kind_hint.hash(&mut hasher);
    request.budget_ceiling.map(f64::to_bits).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{DecisionSnapshot, RoutingDecision};
    use proptest::prelude::*;

    fn decision(backend_id: &str) -> RoutingDecision {
        RoutingDecision {
            backend_id: backend_id.to_string(),
            address: format!("http://{}", backend_id),
            confidence: 0.8,
            reasoning: "test".to_string(),
            estimated_cost: 0.1,
            snapshot: DecisionSnapshot {
                cost_preference: crate::config::CostPreference::Balanced,
                candidates: vec![],
            },
        }
    }

    #[test]
    fn hit_within_ttl() {
        let cache = DecisionCache::new(Duration::from_secs(60), 8);
        cache.put(1, decision("a"));

        let hit = cache.get(1).unwrap();
        assert_eq!(hit.backend_id, "a");
    }

    #[test]
    fn expired_entry_is_removed_on_read() {
        let cache = DecisionCache::new(Duration::ZERO, 8);
        cache.put(1, decision("a"));

        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = DecisionCache::new(Duration::from_secs(60), 8);
        cache.put(1, decision("a"));
        cache.invalidate(1);

        assert!(cache.get(1).is_none());
    }

    #[test]
    fn capacity_bound_evicts_oldest_inserted() {
        let cache = DecisionCache::new(Duration::from_secs(60), 2);
        cache.put(1, decision("a"));
        std::thread::sleep(Duration::from_millis(5));
        cache.put(2, decision("b"));
        std::thread::sleep(Duration::from_millis(5));
        cache.put(3, decision("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn reinserting_same_signature_does_not_evict() {
        let cache = DecisionCache::new(Duration::from_secs(60), 2);
        cache.put(1, decision("a"));
        cache.put(2, decision("b"));
        cache.put(2, decision("b2"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(2).unwrap().backend_id, "b2");
    }

    #[test]
    fn signature_ignores_trace_id() {
        let a = RoutingRequest::new("same digest", 100);
        let b = RoutingRequest::new("same digest", 100);
        assert_ne!(a.id, b.id);
        assert_eq!(signature(&a), signature(&b));
    }

    #[test]
    fn signature_distinguishes_kind_and_budget() {
        let base = RoutingRequest::new("digest", 100);
        let kinded = RoutingRequest::new("digest", 100).with_kind("coding");
        let budgeted = RoutingRequest::new("digest", 100).with_budget(0.5);

        assert_ne!(signature(&base), signature(&kinded));
        assert_ne!(signature(&base), signature(&budgeted));
    }

    proptest! {
        #[test]
        fn signature_is_stable_within_size_bucket(size in 0u32..100_000, offset in 0u32..SIZE_BUCKET) {
            let bucket_start = (size / SIZE_BUCKET) * SIZE_BUCKET;
            let a = RoutingRequest::new("digest", bucket_start);
            let b = RoutingRequest::new("digest", bucket_start + offset);
            prop_assert_eq!(signature(&a), signature(&b));
        }
    }
}
