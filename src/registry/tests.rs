use super::*;
use crate::config::BackendConfig;

fn config(id: &str, limit: u32) -> BackendConfig {
    BackendConfig {
        id: id.to_string(),
        address: format!("http://{}", id),
        tags: vec!["general".to_string()],
        weight: 1,
        cost_per_token: 0.001,
        concurrency_limit: limit,
    }
}

fn registry() -> HealthRegistry {
    HealthRegistry::new(&[config("a", 4), config("b", 8)])
}

#[test]
fn seeds_one_slot_per_backend() {
    let registry = registry();
    assert_eq!(registry.instances().len(), 2);
    assert!(registry.instance("a").is_some());
    assert!(registry.instance("missing").is_none());
}

#[test]
fn starts_healthy_and_unloaded() {
    let registry = registry();
    assert!(registry.is_healthy("a"));
    assert_eq!(registry.load_factor("a").unwrap(), 0.0);
    assert_eq!(registry.avg_latency_ms("a").unwrap(), 0);
}

#[test]
fn load_factor_normalizes_against_ceiling() {
    let registry = registry();
    registry.begin_dispatch("a").unwrap();
    registry.begin_dispatch("a").unwrap();

    // 2 in-flight over a ceiling of 4
    assert_eq!(registry.load_factor("a").unwrap(), 0.5);
    // ceiling can be exceeded; the factor just goes above 1.0
    for _ in 0..4 {
        registry.begin_dispatch("a").unwrap();
    }
    assert!(registry.load_factor("a").unwrap() > 1.0);
}

#[test]
fn end_dispatch_saturates_at_zero() {
    let registry = registry();
    assert_eq!(registry.end_dispatch("a").unwrap(), 0);

    registry.begin_dispatch("a").unwrap();
    assert_eq!(registry.end_dispatch("a").unwrap(), 0);
}

#[test]
fn failure_report_marks_unhealthy_and_records_timestamp() {
    let registry = registry();
    registry.report_health("a", 5_000, false).unwrap();

    assert!(!registry.is_healthy("a"));
    let snapshot = registry.snapshot();
    assert!(snapshot["a"].last_failure.is_some());
    // failure latency does not pollute the rolling average
    assert_eq!(snapshot["a"].avg_latency_ms, 0);
}

#[test]
fn dispatch_failure_does_not_move_health_flag() {
    let registry = registry();
    registry.record_dispatch("a", 2_000, false).unwrap();

    // isolation after dispatch failures is the circuit breaker's job
    assert!(registry.is_healthy("a"));
    assert!(registry.snapshot()["a"].last_failure.is_some());
}

#[test]
fn dispatch_success_feeds_latency_average() {
    let registry = registry();
    registry.record_dispatch("a", 60, true).unwrap();
    assert_eq!(registry.avg_latency_ms("a").unwrap(), 60);
}

#[test]
fn success_report_restores_health() {
    let registry = registry();
    registry.report_health("a", 100, false).unwrap();
    registry.report_health("a", 40, true).unwrap();

    assert!(registry.is_healthy("a"));
    assert_eq!(registry.avg_latency_ms("a").unwrap(), 40);
}

#[test]
fn latency_ema_converges() {
    let registry = registry();
    registry.report_health("a", 100, true).unwrap();
    // new = (sample + 4*old) / 5
    registry.report_health("a", 200, true).unwrap();
    assert_eq!(registry.avg_latency_ms("a").unwrap(), 120);
    registry.report_health("a", 200, true).unwrap();
    assert_eq!(registry.avg_latency_ms("a").unwrap(), 136);
}

#[test]
fn unknown_backend_is_an_error() {
    let registry = registry();
    assert!(matches!(
        registry.report_health("ghost", 10, true),
        Err(RegistryError::BackendNotFound(_))
    ));
    assert!(registry.begin_dispatch("ghost").is_err());
    assert!(!registry.is_healthy("ghost"));
}

#[test]
fn snapshot_reflects_counters() {
    let registry = registry();
    registry.begin_dispatch("b").unwrap();
    registry.report_health("b", 80, true).unwrap();

    let snapshot = registry.snapshot();
    assert_eq!(snapshot["b"].in_flight, 1);
    assert_eq!(snapshot["b"].load_factor, 0.125);
    assert_eq!(snapshot["b"].avg_latency_ms, 80);
    assert!(snapshot["b"].last_check_ok);
}

#[test]
fn concurrent_dispatch_accounting_is_exact() {
    use std::sync::Arc;

    let registry = Arc::new(registry());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(std::thread::spawn(move || {
            for _ in 0..100 {
                registry.begin_dispatch("a").unwrap();
                registry.end_dispatch("a").unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.in_flight("a").unwrap(), 0);
}
