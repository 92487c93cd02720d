//! In-flight checkpoint statistics.
//!
//! A [`PendingCheckpointStats`] is created by the tracker when the coordinator
//! triggers a checkpoint and is shared (behind an `Arc`) with whoever relays
//! subtask acknowledgements. Reports may arrive concurrently from any number
//! of threads; each (task group, subtask index) slot accepts exactly one
//! report. Finalizing into a completed or failed record freezes the
//! accumulated reports and rejects every later report.

use bicycle_core::{CheckpointId, JobVertexId, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::error::{CheckpointStatsError, Result};
use crate::stats::{AcknowledgedStats, CompletedCheckpointStats, FailedCheckpointStats};
use crate::task::{SubtaskStateStats, TaskStateStats};
use crate::types::{CheckpointProperties, CheckpointStatus};

/// Accumulates reports for one task group.
#[derive(Debug)]
struct TaskAccumulator {
    parallelism: usize,
    subtasks: DashMap<usize, SubtaskStateStats>,
}

impl TaskAccumulator {
    fn new(parallelism: usize) -> Self {
        Self {
            parallelism,
            subtasks: DashMap::with_capacity(parallelism),
        }
    }

    fn freeze(&self, job_vertex_id: JobVertexId) -> TaskStateStats {
        let subtasks = self
            .subtasks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        TaskStateStats::new(job_vertex_id, self.parallelism, subtasks)
    }
}

/// Statistics for a checkpoint that is still in progress.
#[derive(Debug)]
pub struct PendingCheckpointStats {
    checkpoint_id: CheckpointId,
    trigger_timestamp: Timestamp,
    properties: CheckpointProperties,
    total_subtask_count: usize,

    tasks: HashMap<JobVertexId, TaskAccumulator>,

    /// Subtasks acknowledged so far, across all task groups
    num_acknowledged: AtomicUsize,
    latest_ack_timestamp: AtomicU64,

    /// Reporters hold the read side, finalization the write side
    finalized: RwLock<bool>,
}

impl PendingCheckpointStats {
    pub(crate) fn new(
        checkpoint_id: CheckpointId,
        trigger_timestamp: Timestamp,
        properties: CheckpointProperties,
        subtasks_by_vertex: &HashMap<JobVertexId, usize>,
    ) -> Self {
        let tasks: HashMap<_, _> = subtasks_by_vertex
            .iter()
            .map(|(vertex, parallelism)| (*vertex, TaskAccumulator::new(*parallelism)))
            .collect();
        let total_subtask_count = subtasks_by_vertex.values().sum();

        Self {
            checkpoint_id,
            trigger_timestamp,
            properties,
            total_subtask_count,
            tasks,
            num_acknowledged: AtomicUsize::new(0),
            latest_ack_timestamp: AtomicU64::new(0),
            finalized: RwLock::new(false),
        }
    }

    pub fn checkpoint_id(&self) -> CheckpointId {
        self.checkpoint_id
    }

    pub fn trigger_timestamp(&self) -> Timestamp {
        self.trigger_timestamp
    }

    pub fn properties(&self) -> &CheckpointProperties {
        &self.properties
    }

    pub fn status(&self) -> CheckpointStatus {
        CheckpointStatus::InProgress
    }

    pub fn total_subtask_count(&self) -> usize {
        self.total_subtask_count
    }

    pub fn num_acknowledged_subtasks(&self) -> usize {
        self.num_acknowledged.load(Ordering::Acquire)
    }

    /// Ack timestamp of the most recent report, if any subtask reported yet.
    pub fn latest_ack_timestamp(&self) -> Option<Timestamp> {
        if self.num_acknowledged_subtasks() == 0 {
            return None;
        }
        Some(self.latest_ack_timestamp.load(Ordering::Acquire))
    }

    /// Whether the record was already turned into a completed or failed one.
    pub fn is_finalized(&self) -> bool {
        *self.finalized.read()
    }

    /// Record a subtask's acknowledgement.
    ///
    /// Returns `false` without changing anything if the task group is
    /// unknown, the index is out of range, the subtask already reported, or
    /// the checkpoint was finalized.
    pub fn report_subtask_stats(&self, job_vertex_id: JobVertexId, stats: SubtaskStateStats) -> bool {
        let finalized = self.finalized.read();
        if *finalized {
            debug!(
                checkpoint_id = self.checkpoint_id,
                subtask = stats.subtask_index,
                "Ignoring subtask report for finalized checkpoint"
            );
            return false;
        }

        let Some(task) = self.tasks.get(&job_vertex_id) else {
            debug!(
                checkpoint_id = self.checkpoint_id,
                vertex = %job_vertex_id,
                "Ignoring subtask report for unknown task group"
            );
            return false;
        };
        if stats.subtask_index >= task.parallelism {
            return false;
        }

        let ack_timestamp = stats.ack_timestamp;
        match task.subtasks.entry(stats.subtask_index) {
            Entry::Occupied(_) => {
                debug!(
                    checkpoint_id = self.checkpoint_id,
                    subtask = stats.subtask_index,
                    "Duplicate subtask report"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(stats);
                self.latest_ack_timestamp
                    .fetch_max(ack_timestamp, Ordering::AcqRel);
                self.num_acknowledged.fetch_add(1, Ordering::AcqRel);
                true
            }
        }
    }

    /// Current reports of one task group.
    pub fn task_stats(&self, job_vertex_id: JobVertexId) -> Option<TaskStateStats> {
        self.tasks
            .get(&job_vertex_id)
            .map(|task| task.freeze(job_vertex_id))
    }

    /// Current reports of all task groups, ordered by vertex id.
    pub fn all_task_stats(&self) -> Vec<TaskStateStats> {
        let mut stats: Vec<_> = self
            .tasks
            .iter()
            .map(|(vertex, task)| task.freeze(*vertex))
            .collect();
        stats.sort_by_key(|t| t.job_vertex_id());
        stats
    }

    pub fn latest_acknowledged_subtask(&self) -> Option<SubtaskStateStats> {
        self.acknowledged().latest_acknowledged_subtask().cloned()
    }

    /// Checkpointed bytes reported so far.
    pub fn checkpointed_size(&self) -> u64 {
        self.acknowledged().checkpointed_size()
    }

    /// Full state bytes reported so far.
    pub fn state_size(&self) -> u64 {
        self.acknowledged().state_size()
    }

    fn acknowledged(&self) -> AcknowledgedStats {
        AcknowledgedStats::from_tasks(self.all_task_stats())
    }

    /// Freeze the accumulated reports. Only the first call succeeds.
    fn finalize(&self) -> Result<AcknowledgedStats> {
        let mut finalized = self.finalized.write();
        if *finalized {
            warn!(checkpoint_id = self.checkpoint_id, "Checkpoint finalized twice");
            return Err(CheckpointStatsError::AlreadyFinalized(self.checkpoint_id));
        }
        let acknowledged = self.acknowledged();
        *finalized = true;
        Ok(acknowledged)
    }

    /// Turn this record into a completed checkpoint record.
    pub fn to_completed_checkpoint_stats(
        &self,
        external_pointer: Option<String>,
        metadata_size: u64,
    ) -> Result<CompletedCheckpointStats> {
        let acknowledged = self.finalize()?;
        Ok(CompletedCheckpointStats::new(
            self.checkpoint_id,
            self.trigger_timestamp,
            self.properties,
            self.total_subtask_count,
            acknowledged,
            external_pointer,
            metadata_size,
        ))
    }

    /// Turn this record into a failed checkpoint record.
    pub fn to_failed_checkpoint(
        &self,
        failure_timestamp: Timestamp,
        failure_message: Option<String>,
    ) -> Result<FailedCheckpointStats> {
        let acknowledged = self.finalize()?;
        Ok(FailedCheckpointStats::new(
            self.checkpoint_id,
            self.trigger_timestamp,
            self.properties,
            self.total_subtask_count,
            acknowledged,
            failure_timestamp,
            failure_message,
        ))
    }
}
