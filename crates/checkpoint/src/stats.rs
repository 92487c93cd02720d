//! Terminal and restored checkpoint records.

use bicycle_core::{CheckpointId, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::pending::PendingCheckpointStats;
use crate::task::{SubtaskStateStats, TaskStateStats};
use crate::types::{CheckpointProperties, CheckpointStatus};

/// Subtask reports of a checkpoint plus their sums.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcknowledgedStats {
    task_stats: Vec<TaskStateStats>,
    num_acknowledged_subtasks: usize,
    checkpointed_size: u64,
    state_size: u64,
    processed_data: u64,
    persisted_data: u64,
    unaligned: bool,
    latest_acknowledged_subtask: Option<SubtaskStateStats>,
}

impl AcknowledgedStats {
    pub(crate) fn from_tasks(task_stats: Vec<TaskStateStats>) -> Self {
        let mut acked = Self::default();
        for task in &task_stats {
            acked.num_acknowledged_subtasks += task.num_acknowledged_subtasks();
            acked.checkpointed_size = acked
                .checkpointed_size
                .saturating_add(task.checkpointed_size());
            acked.state_size = acked
                .state_size
                .saturating_add(task.state_size());
            acked.processed_data = acked
                .processed_data
                .saturating_add(task.processed_data());
            acked.persisted_data = acked
                .persisted_data
                .saturating_add(task.persisted_data());
            acked.unaligned |= task.is_unaligned();

            if let Some(latest) = task.latest_acknowledged_subtask() {
                let newer = acked
                    .latest_acknowledged_subtask
                    .as_ref()
                    .map_or(true, |current| latest.ack_timestamp > current.ack_timestamp);
                if newer {
                    acked.latest_acknowledged_subtask = Some(latest.clone());
                }
            }
        }
        acked.task_stats = task_stats;
        acked
    }

    pub fn task_stats(&self) -> &[TaskStateStats] {
        &self.task_stats
    }

    pub fn num_acknowledged_subtasks(&self) -> usize {
        self.num_acknowledged_subtasks
    }

    pub fn checkpointed_size(&self) -> u64 {
        self.checkpointed_size
    }

    pub fn state_size(&self) -> u64 {
        self.state_size
    }

    pub fn processed_data(&self) -> u64 {
        self.processed_data
    }

    pub fn persisted_data(&self) -> u64 {
        self.persisted_data
    }

    pub fn is_unaligned(&self) -> bool {
        self.unaligned
    }

    pub fn latest_acknowledged_subtask(&self) -> Option<&SubtaskStateStats> {
        self.latest_acknowledged_subtask.as_ref()
    }
}

/// A successfully completed checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckpointStats {
    checkpoint_id: CheckpointId,
    trigger_timestamp: Timestamp,
    properties: CheckpointProperties,
    total_subtask_count: usize,
    acknowledged: AcknowledgedStats,
    /// Storage location of the checkpoint, if externalized
    external_pointer: Option<String>,
    metadata_size: u64,
}

impl CompletedCheckpointStats {
    pub(crate) fn new(
        checkpoint_id: CheckpointId,
        trigger_timestamp: Timestamp,
        properties: CheckpointProperties,
        total_subtask_count: usize,
        acknowledged: AcknowledgedStats,
        external_pointer: Option<String>,
        metadata_size: u64,
    ) -> Self {
        Self {
            checkpoint_id,
            trigger_timestamp,
            properties,
            total_subtask_count,
            acknowledged,
            external_pointer,
            metadata_size,
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
        CheckpointStatus::Completed
    }

    pub fn total_subtask_count(&self) -> usize {
        self.total_subtask_count
    }

    pub fn acknowledged(&self) -> &AcknowledgedStats {
        &self.acknowledged
    }

    pub fn task_stats(&self) -> &[TaskStateStats] {
        self.acknowledged.task_stats()
    }

    pub fn num_acknowledged_subtasks(&self) -> usize {
        self.acknowledged.num_acknowledged_subtasks()
    }

    pub fn checkpointed_size(&self) -> u64 {
        self.acknowledged.checkpointed_size()
    }

    pub fn state_size(&self) -> u64 {
        self.acknowledged.state_size()
    }

    pub fn processed_data(&self) -> u64 {
        self.acknowledged.processed_data()
    }

    pub fn persisted_data(&self) -> u64 {
        self.acknowledged.persisted_data()
    }

    pub fn is_unaligned(&self) -> bool {
        self.acknowledged.is_unaligned()
    }

    pub fn latest_acknowledged_subtask(&self) -> Option<&SubtaskStateStats> {
        self.acknowledged.latest_acknowledged_subtask()
    }

    /// Ack timestamp of the last subtask, or the trigger time if none acknowledged.
    pub fn latest_ack_timestamp(&self) -> Timestamp {
        self.latest_acknowledged_subtask()
            .map_or(self.trigger_timestamp, |s| s.ack_timestamp)
    }

    pub fn end_to_end_duration(&self) -> u64 {
        self.latest_ack_timestamp()
            .saturating_sub(self.trigger_timestamp)
    }

    pub fn external_pointer(&self) -> Option<&str> {
        self.external_pointer.as_deref()
    }

    pub fn metadata_size(&self) -> u64 {
        self.metadata_size
    }
}

/// A checkpoint that failed or was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheckpointStats {
    checkpoint_id: CheckpointId,
    trigger_timestamp: Timestamp,
    properties: CheckpointProperties,
    total_subtask_count: usize,
    acknowledged: AcknowledgedStats,
    failure_timestamp: Timestamp,
    failure_message: Option<String>,
}

impl FailedCheckpointStats {
    pub(crate) fn new(
        checkpoint_id: CheckpointId,
        trigger_timestamp: Timestamp,
        properties: CheckpointProperties,
        total_subtask_count: usize,
        acknowledged: AcknowledgedStats,
        failure_timestamp: Timestamp,
        failure_message: Option<String>,
    ) -> Self {
        Self {
            checkpoint_id,
            trigger_timestamp,
            properties,
            total_subtask_count,
            acknowledged,
            failure_timestamp,
            failure_message,
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
        CheckpointStatus::Failed
    }

    pub fn total_subtask_count(&self) -> usize {
        self.total_subtask_count
    }

    pub fn acknowledged(&self) -> &AcknowledgedStats {
        &self.acknowledged
    }

    pub fn num_acknowledged_subtasks(&self) -> usize {
        self.acknowledged.num_acknowledged_subtasks()
    }

    pub fn failure_timestamp(&self) -> Timestamp {
        self.failure_timestamp
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    pub fn end_to_end_duration(&self) -> u64 {
        self.failure_timestamp
            .saturating_sub(self.trigger_timestamp)
    }
}

/// The checkpoint a job was restored from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredCheckpointStats {
    pub checkpoint_id: CheckpointId,
    pub properties: CheckpointProperties,
    /// Start of the initialization that restored this checkpoint.
    pub restore_timestamp: Timestamp,
    pub external_path: Option<String>,
    pub state_size: u64,
}

/// One entry of the checkpoint history.
#[derive(Debug, Clone)]
pub enum CheckpointStats {
    InProgress(Arc<PendingCheckpointStats>),
    Completed(Arc<CompletedCheckpointStats>),
    Failed(Arc<FailedCheckpointStats>),
}

impl CheckpointStats {
    pub fn checkpoint_id(&self) -> CheckpointId {
        match self {
            Self::InProgress(p) => p.checkpoint_id(),
            Self::Completed(c) => c.checkpoint_id(),
            Self::Failed(f) => f.checkpoint_id(),
        }
    }

    pub fn status(&self) -> CheckpointStatus {
        match self {
            Self::InProgress(_) => CheckpointStatus::InProgress,
            Self::Completed(_) => CheckpointStatus::Completed,
            Self::Failed(_) => CheckpointStatus::Failed,
        }
    }

    pub fn properties(&self) -> &CheckpointProperties {
        match self {
            Self::InProgress(p) => p.properties(),
            Self::Completed(c) => c.properties(),
            Self::Failed(f) => f.properties(),
        }
    }

    pub fn trigger_timestamp(&self) -> Timestamp {
        match self {
            Self::InProgress(p) => p.trigger_timestamp(),
            Self::Completed(c) => c.trigger_timestamp(),
            Self::Failed(f) => f.trigger_timestamp(),
        }
    }

    pub fn is_savepoint(&self) -> bool {
        self.properties().is_savepoint()
    }

    pub fn as_in_progress(&self) -> Option<&Arc<PendingCheckpointStats>> {
        match self {
            Self::InProgress(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_completed(&self) -> Option<&Arc<CompletedCheckpointStats>> {
        match self {
            Self::Completed(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_failed(&self) -> Option<&Arc<FailedCheckpointStats>> {
        match self {
            Self::Failed(f) => Some(f),
            _ => None,
        }
    }
}
