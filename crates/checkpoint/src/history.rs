//! Bounded checkpoint history.

use bicycle_core::CheckpointId;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::pending::PendingCheckpointStats;
use crate::stats::{CheckpointStats, CompletedCheckpointStats, FailedCheckpointStats};

/// The most recent checkpoints, plus the latest of each terminal kind.
///
/// In-progress checkpoints enter the history when they are triggered and are
/// replaced in place when they complete or fail, so entries stay in trigger
/// order. Once more than `max_size` entries are held the oldest is evicted.
/// The latest completed checkpoint, savepoint and failed checkpoint are kept
/// outside the bounded sequence and survive eviction.
#[derive(Debug, Clone)]
pub struct CheckpointStatsHistory {
    max_size: usize,
    /// Oldest first
    checkpoints: VecDeque<CheckpointStats>,
    latest_completed: Option<Arc<CompletedCheckpointStats>>,
    latest_savepoint: Option<Arc<CompletedCheckpointStats>>,
    latest_failed: Option<Arc<FailedCheckpointStats>>,
}

impl CheckpointStatsHistory {
    /// Create a history of at most `max_size` entries. `0` retains nothing.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            checkpoints: VecDeque::with_capacity(max_size),
            latest_completed: None,
            latest_savepoint: None,
            latest_failed: None,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Entries, most recent first.
    pub fn checkpoints(&self) -> impl Iterator<Item = &CheckpointStats> + '_ {
        self.checkpoints.iter().rev()
    }

    pub fn checkpoint_by_id(&self, checkpoint_id: CheckpointId) -> Option<&CheckpointStats> {
        self.checkpoints
            .iter()
            .find(|c| c.checkpoint_id() == checkpoint_id)
    }

    /// Latest completed checkpoint that is not a savepoint.
    pub fn latest_completed_checkpoint(&self) -> Option<&Arc<CompletedCheckpointStats>> {
        self.latest_completed.as_ref()
    }

    pub fn latest_savepoint(&self) -> Option<&Arc<CompletedCheckpointStats>> {
        self.latest_savepoint.as_ref()
    }

    pub fn latest_failed_checkpoint(&self) -> Option<&Arc<FailedCheckpointStats>> {
        self.latest_failed.as_ref()
    }

    pub(crate) fn add_in_progress(&mut self, pending: Arc<PendingCheckpointStats>) {
        if self.max_size == 0 {
            return;
        }
        self.checkpoints
            .push_back(CheckpointStats::InProgress(pending));
        self.evict();
    }

    /// Record a terminal checkpoint.
    ///
    /// Replaces the in-progress entry with the same id if it is still held,
    /// otherwise inserts by id. Latest pointers are updated either way.
    pub(crate) fn add_terminal(&mut self, terminal: CheckpointStats) {
        self.update_latest(&terminal);
        if self.max_size == 0 {
            return;
        }

        let checkpoint_id = terminal.checkpoint_id();
        match self
            .checkpoints
            .iter()
            .position(|c| c.checkpoint_id() == checkpoint_id)
        {
            Some(pos) => self.checkpoints[pos] = terminal,
            None => {
                let pos = self
                    .checkpoints
                    .partition_point(|c| c.checkpoint_id() < checkpoint_id);
                self.checkpoints.insert(pos, terminal);
                self.evict();
            }
        }
    }

    fn evict(&mut self) {
        while self.checkpoints.len() > self.max_size {
            self.checkpoints.pop_front();
        }
    }

    fn update_latest(&mut self, terminal: &CheckpointStats) {
        match terminal {
            CheckpointStats::Completed(completed) => {
                let slot = if completed.properties().is_savepoint() {
                    &mut self.latest_savepoint
                } else {
                    &mut self.latest_completed
                };
                if slot
                    .as_ref()
                    .map_or(true, |c| completed.checkpoint_id() > c.checkpoint_id())
                {
                    *slot = Some(completed.clone());
                }
            }
            CheckpointStats::Failed(failed) => {
                if self
                    .latest_failed
                    .as_ref()
                    .map_or(true, |f| failed.checkpoint_id() > f.checkpoint_id())
                {
                    self.latest_failed = Some(failed.clone());
                }
            }
            CheckpointStats::InProgress(_) => {}
        }
    }
}
