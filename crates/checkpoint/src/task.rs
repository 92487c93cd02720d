//! Per-subtask and per-task-group checkpoint statistics.

use bicycle_core::{JobVertexId, Timestamp};
use serde::{Deserialize, Serialize};

/// Statistics a single subtask reports when it acknowledges a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskStateStats {
    pub subtask_index: usize,
    pub ack_timestamp: Timestamp,
    /// Bytes written for this checkpoint (incremental part only).
    pub checkpointed_size: u64,
    /// Full size of the subtask's state.
    pub state_size: u64,
    pub sync_duration_ms: u64,
    pub async_duration_ms: u64,
    /// Bytes processed during alignment.
    pub processed_data: u64,
    /// Bytes of in-flight data persisted (unaligned checkpoints).
    pub persisted_data: u64,
    pub alignment_duration_ms: u64,
    pub checkpoint_start_delay_ms: u64,
    pub unaligned_checkpoint: bool,
    /// Whether the subtask took its own snapshot, as opposed to reporting on
    /// behalf of an already finished task.
    pub completed: bool,
}

impl SubtaskStateStats {
    /// A report with all sizes and durations zero.
    pub fn new(subtask_index: usize, ack_timestamp: Timestamp) -> Self {
        Self {
            subtask_index,
            ack_timestamp,
            checkpointed_size: 0,
            state_size: 0,
            sync_duration_ms: 0,
            async_duration_ms: 0,
            processed_data: 0,
            persisted_data: 0,
            alignment_duration_ms: 0,
            checkpoint_start_delay_ms: 0,
            unaligned_checkpoint: false,
            completed: true,
        }
    }

    pub fn with_sizes(mut self, checkpointed_size: u64, state_size: u64) -> Self {
        self.checkpointed_size = checkpointed_size;
        self.state_size = state_size;
        self
    }

    pub fn with_data(mut self, processed_data: u64, persisted_data: u64) -> Self {
        self.processed_data = processed_data;
        self.persisted_data = persisted_data;
        self
    }

    pub fn with_durations(mut self, sync_ms: u64, async_ms: u64) -> Self {
        self.sync_duration_ms = sync_ms;
        self.async_duration_ms = async_ms;
        self
    }

    pub fn with_alignment(mut self, alignment_ms: u64, start_delay_ms: u64) -> Self {
        self.alignment_duration_ms = alignment_ms;
        self.checkpoint_start_delay_ms = start_delay_ms;
        self
    }

    pub fn with_unaligned(mut self, unaligned: bool) -> Self {
        self.unaligned_checkpoint = unaligned;
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Time from checkpoint trigger to this acknowledgement.
    pub fn end_to_end_duration(&self, trigger_timestamp: Timestamp) -> u64 {
        self.ack_timestamp.saturating_sub(trigger_timestamp)
    }
}

/// Acknowledged subtask reports of one task group, frozen at some point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStateStats {
    job_vertex_id: JobVertexId,
    parallelism: usize,
    /// Sorted by subtask index.
    subtasks: Vec<SubtaskStateStats>,
}

impl TaskStateStats {
    pub(crate) fn new(
        job_vertex_id: JobVertexId,
        parallelism: usize,
        mut subtasks: Vec<SubtaskStateStats>,
    ) -> Self {
        subtasks.sort_by_key(|s| s.subtask_index);
        Self {
            job_vertex_id,
            parallelism,
            subtasks,
        }
    }

    pub fn job_vertex_id(&self) -> JobVertexId {
        self.job_vertex_id
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn num_acknowledged_subtasks(&self) -> usize {
        self.subtasks.len()
    }

    pub fn subtasks(&self) -> &[SubtaskStateStats] {
        &self.subtasks
    }

    /// Report of the given subtask, if it acknowledged.
    pub fn subtask(&self, index: usize) -> Option<&SubtaskStateStats> {
        self.subtasks
            .binary_search_by_key(&index, |s| s.subtask_index)
            .ok()
            .map(|pos| &self.subtasks[pos])
    }

    pub fn latest_acknowledged_subtask(&self) -> Option<&SubtaskStateStats> {
        self.subtasks.iter().max_by_key(|s| s.ack_timestamp)
    }

    pub fn checkpointed_size(&self) -> u64 {
        self.subtasks
            .iter()
            .fold(0, |acc, s| acc.saturating_add(s.checkpointed_size))
    }

    pub fn state_size(&self) -> u64 {
        self.subtasks
            .iter()
            .fold(0, |acc, s| acc.saturating_add(s.state_size))
    }

    pub fn processed_data(&self) -> u64 {
        self.subtasks
            .iter()
            .fold(0, |acc, s| acc.saturating_add(s.processed_data))
    }

    pub fn persisted_data(&self) -> u64 {
        self.subtasks
            .iter()
            .fold(0, |acc, s| acc.saturating_add(s.persisted_data))
    }

    pub fn is_unaligned(&self) -> bool {
        self.subtasks.iter().any(|s| s.unaligned_checkpoint)
    }
}
