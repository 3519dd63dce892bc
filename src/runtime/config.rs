//! Runtime configuration
//!
//! Loaded from JSON or built in code; every field has a default, so partial
//! documents are accepted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default job budget for a single microtask checkpoint
pub const DEFAULT_MAX_JOBS_PER_CHECKPOINT: usize = 10_000;

/// Tunables for a [`Runtime`](crate::Runtime)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of jobs one `run_microtask_checkpoint` call executes
    pub max_jobs_per_checkpoint: usize,
    /// Wrap values produced by async-from-sync iterators with `PromiseResolve`
    /// (the current language behavior). When false, a fresh capability is
    /// resolved with the value instead, as older engines did.
    pub async_from_sync_uses_promise_resolve: bool,
    /// Keep a list of rejected promises that have no handler attached
    pub track_unhandled_rejections: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_checkpoint: DEFAULT_MAX_JOBS_PER_CHECKPOINT,
            async_from_sync_uses_promise_resolve: true,
            track_unhandled_rejections: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Reject settings the job loop cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.max_jobs_per_checkpoint == 0 {
            return Err(Error::ConfigError(
                "max_jobs_per_checkpoint must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
