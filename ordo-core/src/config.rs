//! Configuration for ORDO components and the host program.
//!
//! Every field has a default, so an empty JSON object is a valid config file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TTL_SECONDS;
use crate::error::{OrdoError, Result};

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL in seconds used by `execute_default`
    pub default_ttl_seconds: u64,
    /// Maximum number of entries (None = unbounded)
    pub max_entries: Option<usize>,
    /// Whether to count hits, misses, and failures
    pub track_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            max_entries: None,
            track_stats: true,
        }
    }
}

impl CacheConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default TTL in whole seconds.
    pub fn default_ttl_secs(mut self, seconds: u64) -> Self {
        self.default_ttl_seconds = seconds;
        self
    }

    /// Bounds the table to `max` entries.
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Disables hit/miss counters.
    pub fn without_stats(mut self) -> Self {
        self.track_stats = false;
        self
    }

    /// The default TTL as a `Duration`.
    pub fn default_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == Some(0) {
            return Err(OrdoError::ConfigError(
                "max_entries must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level host-program configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdoConfig {
    /// Cache settings
    pub cache: CacheConfig,
    /// `tracing` filter directive (overridden by `RUST_LOG`)
    pub log_filter: Option<String>,
}

impl OrdoConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()
    }
}
