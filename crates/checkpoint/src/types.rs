//! Common types for checkpoint statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format a savepoint is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SavepointFormat {
    /// Backend-independent format.
    Canonical,
    /// The state backend's own format.
    Native,
}

/// Kind of snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotKind {
    Checkpoint,
    Savepoint(SavepointFormat),
}

/// What happens to the snapshot data once the job terminates.
///
/// Carried opaquely; statistics only distinguish savepoints from checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetentionPolicy {
    NeverRetainAfterTermination,
    RetainOnFailure,
    RetainOnCancellation,
    RetainAlways,
}

/// Kind and retention policy of one checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointProperties {
    kind: SnapshotKind,
    retention: RetentionPolicy,
}

impl CheckpointProperties {
    /// Properties of a periodic checkpoint.
    pub fn for_checkpoint(retention: RetentionPolicy) -> Self {
        Self {
            kind: SnapshotKind::Checkpoint,
            retention,
        }
    }

    /// Properties of a savepoint. Savepoints are always retained.
    pub fn for_savepoint(format: SavepointFormat) -> Self {
        Self {
            kind: SnapshotKind::Savepoint(format),
            retention: RetentionPolicy::RetainAlways,
        }
    }

    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn is_savepoint(&self) -> bool {
        matches!(self.kind, SnapshotKind::Savepoint(_))
    }

    /// Name used in span and event attributes.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            SnapshotKind::Checkpoint => "Checkpoint",
            SnapshotKind::Savepoint(_) => "Savepoint",
        }
    }
}

/// Lifecycle status of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckpointStatus {
    InProgress,
    Completed,
    Failed,
}

impl CheckpointStatus {
    pub fn is_in_progress(&self) -> bool {
        *self == Self::InProgress
    }

    pub fn is_completed(&self) -> bool {
        *self == Self::Completed
    }

    pub fn is_failed(&self) -> bool {
        *self == Self::Failed
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}
