//! Checkpoint counters.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Counts of checkpoints by status.
///
/// `total == in_progress + completed + failed` holds after every mutation.
/// Restores are counted separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointStatsCounts {
    restored: u64,
    total: u64,
    in_progress: u64,
    completed: u64,
    failed: u64,
}

impl CheckpointStatsCounts {
    pub fn number_of_restored_checkpoints(&self) -> u64 {
        self.restored
    }

    pub fn total_number_of_checkpoints(&self) -> u64 {
        self.total
    }

    pub fn number_of_in_progress_checkpoints(&self) -> u64 {
        self.in_progress
    }

    pub fn number_of_completed_checkpoints(&self) -> u64 {
        self.completed
    }

    pub fn number_of_failed_checkpoints(&self) -> u64 {
        self.failed
    }

    pub(crate) fn increment_restored_checkpoints(&mut self) {
        self.restored += 1;
    }

    pub(crate) fn increment_in_progress_checkpoints(&mut self) {
        self.total += 1;
        self.in_progress += 1;
    }

    pub(crate) fn increment_completed_checkpoints(&mut self) {
        if self.leave_in_progress() {
            self.completed += 1;
        }
    }

    pub(crate) fn increment_failed_checkpoints(&mut self) {
        if self.leave_in_progress() {
            self.failed += 1;
        }
    }

    /// A failure that never had an in-progress phase.
    pub(crate) fn increment_failed_checkpoints_without_in_progress(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    fn leave_in_progress(&mut self) -> bool {
        if self.in_progress == 0 {
            warn!("Terminal checkpoint reported without an in-progress checkpoint; counts unchanged");
            return false;
        }
        self.in_progress -= 1;
        true
    }
}
