//! PloverBuilder - Builder API for creating Plover with configuration

use crate::config::RuntimeConfig;
use crate::plover_runtime::{Plover, PloverError};

/// Builder for embedded runtime
///
/// # Example
///
/// ```ignore
/// use plover_vm_runtime::PloverBuilder;
///
/// // Basic runtime
/// let plover = PloverBuilder::new().build();
///
/// // With limits
/// let plover = PloverBuilder::new()
///     .max_jobs_per_drain(10_000)
///     .max_ticks(60_000)
///     .build();
///
/// // From a TOML file's contents
/// let plover = PloverBuilder::from_toml(&source)?.build();
/// ```
#[derive(Debug, Default)]
pub struct PloverBuilder {
    config: Option<RuntimeConfig>,
}

impl PloverBuilder {
    /// Create a new builder with default limits
    pub fn new() -> Self {
        Self { config: None }
    }

    /// Start from a TOML configuration
    pub fn from_toml(source: &str) -> Result<Self, PloverError> {
        Ok(Self::new().config(RuntimeConfig::from_toml_str(source)?))
    }

    /// Set runtime configuration.
    ///
    /// If not set, uses `RuntimeConfig::default()`.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Limit nested native calls
    pub fn max_native_depth(mut self, depth: usize) -> Self {
        self.config_mut().max_native_depth = depth;
        self
    }

    /// Limit jobs per drain
    pub fn max_jobs_per_drain(mut self, limit: usize) -> Self {
        self.config_mut().max_jobs_per_drain = limit;
        self
    }

    /// Limit the virtual clock
    pub fn max_ticks(mut self, limit: u64) -> Self {
        self.config_mut().max_ticks = limit;
        self
    }

    fn config_mut(&mut self) -> &mut RuntimeConfig {
        self.config.get_or_insert_with(RuntimeConfig::default)
    }

    /// Build the runtime
    pub fn build(self) -> Plover {
        Plover::with_config(self.config.unwrap_or_default())
    }
}
