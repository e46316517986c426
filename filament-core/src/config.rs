//! Runtime Configuration
//!
//! Each thread's runtime reads its limits from a [`RuntimeConfig`]. The
//! defaults suit interactive use; tests and embedders can tighten them.

use std::cell::RefCell;

use serde::Deserialize;

use crate::error::Result;

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Tunables for the propagation engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of evaluate rounds in one propagation before it is
    /// abandoned as runaway.
    pub max_flush_rounds: usize,

    /// Log a warning when a computation or cleanup is created with no owner.
    pub warn_unowned: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_rounds: 100_000,
            warn_unowned: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The configuration installed for the current thread.
    pub fn current() -> Self {
        CONFIG.with(|config| config.borrow().clone())
    }
}

/// Install a configuration for the current thread's runtime.
pub fn configure(config: RuntimeConfig) {
    tracing::debug!(?config, "runtime configured");
    CONFIG.with(|current| *current.borrow_mut() = config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "max_flush_rounds": 8 }"#).unwrap();
        assert_eq!(config.max_flush_rounds, 8);
        assert!(!config.warn_unowned);
    }

    #[test]
    fn configure_is_per_thread() {
        configure(RuntimeConfig {
            max_flush_rounds: 5,
            warn_unowned: true,
        });
        assert_eq!(RuntimeConfig::current().max_flush_rounds, 5);

        let other = std::thread::spawn(RuntimeConfig::current).join().unwrap();
        assert_eq!(other, RuntimeConfig::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RuntimeConfig::from_json("{ not json").is_err());
    }
}
