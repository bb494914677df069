//! Tracing/logging initialization.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Subscriber settings. `RUST_LOG` always wins over `default_filter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directives used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    /// JSON lines when true, human-readable text otherwise.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: true,
        }
    }
}

impl ObservabilityConfig {
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber. Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with(config: &ObservabilityConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn init_for_tests() {
    let config = ObservabilityConfig {
        default_filter: "debug".to_string(),
        json: false,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_json_at_info() {
        let config = ObservabilityConfig::default();
        assert!(config.json);
        assert_eq!(config.default_filter, "info");
    }

    #[test]
    fn init_is_idempotent() {
        init_for_tests();
        init_for_tests();
        init_with(&ObservabilityConfig::default());
    }
}
