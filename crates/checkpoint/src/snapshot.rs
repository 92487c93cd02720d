//! Immutable read model of the tracker.

use crate::counts::CheckpointStatsCounts;
use crate::history::CheckpointStatsHistory;
use crate::restore::JobInitializationStats;
use crate::stats::RestoredCheckpointStats;
use crate::summary::CompletedCheckpointStatsSummarySnapshot;

/// Point-in-time view of all checkpoint statistics.
///
/// Counts, history and summary are taken under one lock and are mutually
/// consistent. In-progress history entries are shared handles and keep
/// showing subtask acknowledgements that arrive after the snapshot was
/// built.
#[derive(Debug, Clone)]
pub struct CheckpointStatsSnapshot {
    counts: CheckpointStatsCounts,
    summary: CompletedCheckpointStatsSummarySnapshot,
    history: CheckpointStatsHistory,
    latest_restored: Option<RestoredCheckpointStats>,
    latest_initialization: Option<JobInitializationStats>,
}

impl CheckpointStatsSnapshot {
    pub(crate) fn new(
        counts: CheckpointStatsCounts,
        summary: CompletedCheckpointStatsSummarySnapshot,
        history: CheckpointStatsHistory,
        latest_restored: Option<RestoredCheckpointStats>,
        latest_initialization: Option<JobInitializationStats>,
    ) -> Self {
        Self {
            counts,
            summary,
            history,
            latest_restored,
            latest_initialization,
        }
    }

    pub fn counts(&self) -> &CheckpointStatsCounts {
        &self.counts
    }

    pub fn summary_stats(&self) -> &CompletedCheckpointStatsSummarySnapshot {
        &self.summary
    }

    pub fn history(&self) -> &CheckpointStatsHistory {
        &self.history
    }

    /// Checkpoint the most recent restore started from.
    pub fn latest_restored_checkpoint(&self) -> Option<&RestoredCheckpointStats> {
        self.latest_restored.as_ref()
    }

    /// Consolidated metrics of the most recent completed restore generation.
    pub fn latest_initialization(&self) -> Option<&JobInitializationStats> {
        self.latest_initialization.as_ref()
    }
}
