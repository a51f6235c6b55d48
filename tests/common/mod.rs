use switchyard::config::{BackendConfig, LoggingConfig, RouterConfig};
use switchyard::logging::build_filter_directives;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let directives = build_filter_directives(&LoggingConfig::default());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directives))
        .with_test_writer()
        .try_init();
}

pub fn backend(id: &str, tags: &[&str], weight: u32, cost_per_token: f64) -> BackendConfig {
    BackendConfig {
        id: id.to_string(),
        address: format!("http://{}:8000", id),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        weight,
        cost_per_token,
        concurrency_limit: 8,
    }
}

pub fn config_with(backends: Vec<BackendConfig>) -> RouterConfig {
    RouterConfig {
        backends,
        ..RouterConfig::default()
    }
}
