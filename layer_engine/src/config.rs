//! Engine tuning loaded from TOML.

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::LayerError;

const DEFAULT_REFERENCE_CACHE_SIZE: usize = 1000;
const DEFAULT_PROGRAM_CACHE_SIZE: usize = 1000;
const DEFAULT_RESULT_CACHE_SIZE: usize = 10000;
const DEFAULT_PARALLEL_THRESHOLD: usize = 512;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the `${...}` reference memo, keyed by expression source.
    pub reference_cache_size: usize,
    /// Capacity of the parsed-program cache.
    pub program_cache_size: usize,
    /// Capacity of the evaluated-result cache.
    pub result_cache_size: usize,
    /// Feature count at which per-feature evaluation fans out over rayon.
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_cache_size: DEFAULT_REFERENCE_CACHE_SIZE,
            program_cache_size: DEFAULT_PROGRAM_CACHE_SIZE,
            result_cache_size: DEFAULT_RESULT_CACHE_SIZE,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, LayerError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayerError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub(crate) fn capacity(size: usize) -> NonZeroUsize {
        NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("result_cache_size = 42").unwrap();
        assert_eq!(config.result_cache_size, 42);
        assert_eq!(config.reference_cache_size, DEFAULT_REFERENCE_CACHE_SIZE);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(EngineConfig::capacity(0).get(), 1);
    }
}
