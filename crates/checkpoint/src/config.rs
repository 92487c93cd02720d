//! Checkpoint statistics configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for checkpoint statistics tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointStatsConfig {
    /// Number of terminal checkpoints kept in the queryable history.
    ///
    /// `0` disables the history. Counts, summary and the latest
    /// completed/savepoint/failed records are maintained regardless.
    pub history_size: usize,
}

impl Default for CheckpointStatsConfig {
    fn default() -> Self {
        Self { history_size: 10 }
    }
}

impl CheckpointStatsConfig {
    /// Config with the given history size.
    pub fn with_history_size(history_size: usize) -> Self {
        Self { history_size }
    }

    /// Parse a JSON configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse checkpoint stats config")
    }
}
