//! Runtime configuration

use serde::Deserialize;

use plover_vm_core::context::DEFAULT_MAX_NATIVE_DEPTH;

use crate::plover_runtime::PloverError;

/// Configuration for creating a new runtime.
///
/// Loadable from TOML; missing keys take their defaults and unknown keys are
/// an error.
///
/// ```toml
/// max_native_depth = 128
/// max_jobs_per_drain = 10000
/// max_ticks = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum nested native call depth
    pub max_native_depth: usize,
    /// Maximum jobs run by one drain before it is aborted
    pub max_jobs_per_drain: usize,
    /// Timers due after this tick are never run
    pub max_ticks: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_native_depth: DEFAULT_MAX_NATIVE_DEPTH,
            max_jobs_per_drain: 1_000_000,
            max_ticks: 1_000_000,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(source: &str) -> Result<Self, PloverError> {
        Ok(toml::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = RuntimeConfig::from_toml_str("max_ticks = 50").unwrap();
        assert_eq!(config.max_ticks, 50);
        assert_eq!(config.max_native_depth, DEFAULT_MAX_NATIVE_DEPTH);
        assert_eq!(config.max_jobs_per_drain, RuntimeConfig::default().max_jobs_per_drain);
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RuntimeConfig::from_toml_str("max_heap_size = 1").unwrap_err();
        assert!(matches!(err, PloverError::Config(_)));
    }
}
