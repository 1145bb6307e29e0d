//! Global configuration model for berth.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BerthConfig {
    /// Maximum number of containers reconciled at once within a round.
    pub max_parallel: usize,
    /// Path to the desired-state manifest.
    pub manifest: PathBuf,
}

impl BerthConfig {
    /// Returns the parallelism bound, never less than one.
    #[must_use]
    pub fn effective_parallelism(&self) -> usize {
        self.max_parallel.max(1)
    }
}

impl Default for BerthConfig {
    fn default() -> Self {
        Self {
            max_parallel: crate::constants::DEFAULT_MAX_PARALLEL,
            manifest: PathBuf::from(crate::constants::DEFAULT_MANIFEST),
        }
    }
}
