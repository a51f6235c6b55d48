//! Structured logging helpers
//!
//! The router itself only emits `tracing` events; subscriber installation is
//! the embedding application's job. This module builds the filter directives
//! that application should feed to its `EnvFilter`.

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level and
/// any component-specific levels configured in the LoggingConfig.
///
/// # Examples
///
/// ```
/// use switchyard::config::LoggingConfig;
/// use switchyard::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("breaker".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: switchyard::config::LogFormat::Pretty,
///     component_levels: Some(component_levels),
/// };
///
/// let filter_str = build_filter_directives(&config);
/// assert_eq!(filter_str, "info,switchyard::breaker=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",switchyard::{}={}", component, level));
        }
    }

    filter_str
}
