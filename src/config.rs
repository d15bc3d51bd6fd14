//! Queue tuning, loadable from the environment.
//!
//! A [`QueueConfig`] carries the knobs for one [`JobQueue`]. Hosts
//! embedding serialq in their own config files get serde derives; the
//! process-wide entry point loads from environment variables in the
//! usual fail-fast way.
//!
//! [`JobQueue`]: crate::queue::JobQueue

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default batch ceiling for the drain loop.
///
/// Once an executor has consumed this many jobs from its bucket in one
/// pass, it physically removes the processed prefix from storage before
/// scanning on. Inherited tuning constant; no measured derivation.
pub const DEFAULT_GC_LIMIT: usize = 10_000;

/// Tuning for a [`JobQueue`](crate::queue::JobQueue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Batch ceiling for the executor drain loop. Smaller values
    /// compact more eagerly; larger values defer the removal cost over
    /// longer bursts. Must be at least 1.
    #[serde(default = "default_gc_limit")]
    pub gc_limit: usize,
}

fn default_gc_limit() -> usize {
    DEFAULT_GC_LIMIT
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            gc_limit: DEFAULT_GC_LIMIT,
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables.
    ///
    /// `SERIALQ_GC_LIMIT` overrides the batch ceiling; unset falls back
    /// to [`DEFAULT_GC_LIMIT`].
    pub fn from_env() -> Result<Self> {
        let gc_limit = match std::env::var("SERIALQ_GC_LIMIT") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("SERIALQ_GC_LIMIT is not a valid count: {raw:?}"))
            })?,
            Err(_) => DEFAULT_GC_LIMIT,
        };

        let config = Self { gc_limit };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the drain loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.gc_limit == 0 {
            return Err(Error::InvalidGcLimit(self.gc_limit));
        }
        Ok(())
    }
}
