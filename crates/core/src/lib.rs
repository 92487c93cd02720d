//! Core types shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Milliseconds since Unix epoch (or any monotonic-ish reference; up to the reporter).
pub type Timestamp = u64;

/// Checkpoint identifier. Assigned by the coordinator, strictly increasing per job.
pub type CheckpointId = u64;

/// Identifies a task group (job vertex): all parallel subtasks of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobVertexId(Uuid);

impl JobVertexId {
    /// Create a new random vertex id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobVertexId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobVertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vertex-{}", self.0.simple())
    }
}

/// Identifies one execution attempt of one subtask.
///
/// Every restart deploys fresh attempts, so attempt ids never repeat across
/// restore generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionAttemptId(Uuid);

impl ExecutionAttemptId {
    /// Create a new random attempt id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ExecutionAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0.simple())
    }
}
