//! Checkpoint statistics tracking.
//!
//! The checkpoint coordinator reports every checkpoint's lifecycle here:
//! - Pending checkpoints and the subtask acknowledgements they collect
//! - Completion and failure, with counts, a bounded history and summaries
//! - Restores across failover generations
//!
//! Readers take consistent point-in-time views via
//! [`CheckpointStatsTracker::create_snapshot`], and live gauges, spans and
//! events are published through a [`StatsReporter`].

pub mod config;
pub mod counts;
pub mod error;
pub mod history;
pub mod pending;
pub mod reporter;
pub mod restore;
pub mod snapshot;
pub mod stats;
pub mod summary;
pub mod task;
pub mod tracker;
pub mod types;

pub use config::CheckpointStatsConfig;
pub use counts::CheckpointStatsCounts;
pub use error::{CheckpointStatsError, Result};
pub use history::CheckpointStatsHistory;
pub use pending::PendingCheckpointStats;
pub use reporter::{
    AttributeValue, CheckpointStatsListener, Event, Gauge, GaugeValue, NoOpListener, NoOpReporter,
    Span, StatsReporter,
};
pub use restore::{
    DurationAggregate, InitializationStatus, JobInitializationStats, SubTaskInitializationMetrics,
    SubTaskInitializationMetricsBuilder,
};
pub use snapshot::CheckpointStatsSnapshot;
pub use stats::{
    AcknowledgedStats, CheckpointStats, CompletedCheckpointStats, FailedCheckpointStats,
    RestoredCheckpointStats,
};
pub use summary::{
    CompletedCheckpointStatsSummary, CompletedCheckpointStatsSummarySnapshot, StatsSummary,
    StatsSummarySnapshot,
};
pub use task::{SubtaskStateStats, TaskStateStats};
pub use tracker::CheckpointStatsTracker;
pub use types::{
    CheckpointProperties, CheckpointStatus, RetentionPolicy, SavepointFormat, SnapshotKind,
};
