//! Error types for checkpoint statistics tracking.

use bicycle_core::CheckpointId;

/// Protocol violations reported by the tracker.
///
/// These indicate a bug in the caller (the coordinator) and are never
/// produced for the benign races of concurrent subtask reporting, which are
/// signalled through `bool` returns instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckpointStatsError {
    /// A pending checkpoint was reported with an id that does not increase.
    #[error("checkpoint id {id} must be greater than the last reported id {last}")]
    NonMonotonicCheckpointId { id: CheckpointId, last: CheckpointId },

    /// A terminal record was reported for a checkpoint that is not in progress.
    #[error("checkpoint {0} is not in progress")]
    UnknownCheckpoint(CheckpointId),

    /// A pending checkpoint was finalized twice.
    #[error("checkpoint {0} has already been finalized")]
    AlreadyFinalized(CheckpointId),

    /// A restored checkpoint was reported before initialization started.
    #[error("restored checkpoint {0} reported before any initialization started")]
    NoInitializationInProgress(CheckpointId),
}

/// Result alias for tracker operations.
pub type Result<T> = std::result::Result<T, CheckpointStatsError>;
