//! Running statistics over every completed checkpoint.
//!
//! The summary is independent of the history: it keeps folding in
//! completed checkpoints after the history evicted them, or when the
//! history is disabled.

use serde::{Deserialize, Serialize};

use crate::stats::CompletedCheckpointStats;

/// Count, min, max and sum of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSummary {
    count: u64,
    min: u64,
    max: u64,
    sum: u64,
}

impl StatsSummary {
    pub fn add(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn snapshot(&self) -> StatsSummarySnapshot {
        let (min, max, average) = if self.count == 0 {
            (None, None, None)
        } else {
            (
                Some(self.min),
                Some(self.max),
                Some(self.sum as f64 / self.count as f64),
            )
        };
        StatsSummarySnapshot {
            count: self.count,
            min,
            max,
            sum: self.sum,
            average,
        }
    }
}

/// Read-only view of a [`StatsSummary`]. Empty summaries have no min, max or average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummarySnapshot {
    pub count: u64,
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub sum: u64,
    pub average: Option<f64>,
}

/// Summaries of all completed checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CompletedCheckpointStatsSummary {
    state_size: StatsSummary,
    checkpointed_size: StatsSummary,
    end_to_end_duration: StatsSummary,
    processed_data: StatsSummary,
    persisted_data: StatsSummary,
}

impl CompletedCheckpointStatsSummary {
    pub(crate) fn update(&mut self, completed: &CompletedCheckpointStats) {
        self.state_size.add(completed.state_size());
        self.checkpointed_size.add(completed.checkpointed_size());
        self.end_to_end_duration.add(completed.end_to_end_duration());
        self.processed_data.add(completed.processed_data());
        self.persisted_data.add(completed.persisted_data());
    }

    pub(crate) fn snapshot(&self) -> CompletedCheckpointStatsSummarySnapshot {
        CompletedCheckpointStatsSummarySnapshot {
            state_size: self.state_size.snapshot(),
            checkpointed_size: self.checkpointed_size.snapshot(),
            end_to_end_duration: self.end_to_end_duration.snapshot(),
            processed_data: self.processed_data.snapshot(),
            persisted_data: self.persisted_data.snapshot(),
        }
    }
}

/// Immutable summary as exposed in a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletedCheckpointStatsSummarySnapshot {
    pub state_size: StatsSummarySnapshot,
    pub checkpointed_size: StatsSummarySnapshot,
    pub end_to_end_duration: StatsSummarySnapshot,
    pub processed_data: StatsSummarySnapshot,
    pub persisted_data: StatsSummarySnapshot,
}
