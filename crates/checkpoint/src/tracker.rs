//! Checkpoint statistics tracker.

use bicycle_core::{CheckpointId, ExecutionAttemptId, JobVertexId, Timestamp};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use crate::config::CheckpointStatsConfig;
use crate::counts::CheckpointStatsCounts;
use crate::error::{CheckpointStatsError, Result};
use crate::history::CheckpointStatsHistory;
use crate::pending::PendingCheckpointStats;
use crate::reporter::{
    AttributeValue, CheckpointStatsListener, Event, Gauge, GaugeValue, NoOpListener, Span,
    StatsReporter,
};
use crate::restore::{JobInitializationStats, RestoreGeneration, SubTaskInitializationMetrics};
use crate::snapshot::CheckpointStatsSnapshot;
use crate::stats::{
    CheckpointStats, CompletedCheckpointStats, FailedCheckpointStats, RestoredCheckpointStats,
};
use crate::summary::CompletedCheckpointStatsSummary;
use crate::task::SubtaskStateStats;
use crate::types::CheckpointProperties;

pub const NUMBER_OF_CHECKPOINTS_METRIC: &str = "totalNumberOfCheckpoints";
pub const NUMBER_OF_IN_PROGRESS_CHECKPOINTS_METRIC: &str = "numberOfInProgressCheckpoints";
pub const NUMBER_OF_COMPLETED_CHECKPOINTS_METRIC: &str = "numberOfCompletedCheckpoints";
pub const NUMBER_OF_FAILED_CHECKPOINTS_METRIC: &str = "numberOfFailedCheckpoints";
pub const LATEST_RESTORED_CHECKPOINT_TIMESTAMP_METRIC: &str = "lastCheckpointRestoreTimestamp";
pub const LATEST_COMPLETED_CHECKPOINT_SIZE_METRIC: &str = "lastCheckpointSize";
pub const LATEST_COMPLETED_CHECKPOINT_METADATA_SIZE_METRIC: &str = "lastCheckpointMetadataSize";
pub const LATEST_COMPLETED_CHECKPOINT_FULL_SIZE_METRIC: &str = "lastCheckpointFullSize";
pub const LATEST_COMPLETED_CHECKPOINT_DURATION_METRIC: &str = "lastCheckpointDuration";
pub const LATEST_COMPLETED_CHECKPOINT_PROCESSED_DATA_METRIC: &str = "lastCheckpointProcessedData";
pub const LATEST_COMPLETED_CHECKPOINT_PERSISTED_DATA_METRIC: &str = "lastCheckpointPersistedData";
pub const LATEST_COMPLETED_CHECKPOINT_EXTERNAL_PATH_METRIC: &str = "lastCheckpointExternalPath";
pub const LATEST_COMPLETED_CHECKPOINT_ID_METRIC: &str = "lastCompletedCheckpointId";
pub const LATEST_CHECKPOINT_COMPLETED_TIMESTAMP_METRIC: &str = "lastCheckpointCompletedTimestamp";

/// Gauge value of the external path when none is known.
pub const NOT_AVAILABLE: &str = "n/a";

/// Scope of every span and event the tracker emits.
pub const STATS_SCOPE: &str = "CheckpointStatsTracker";
pub const CHECKPOINT_SPAN: &str = "Checkpoint";
pub const CHECKPOINT_EVENT: &str = "CheckpointEvent";

/// Everything guarded by the tracker lock.
struct TrackerState {
    counts: CheckpointStatsCounts,
    summary: CompletedCheckpointStatsSummary,
    history: CheckpointStatsHistory,

    /// In-progress checkpoints by id
    pending: HashMap<CheckpointId, Arc<PendingCheckpointStats>>,
    last_checkpoint_id: Option<CheckpointId>,
    /// Latest completed checkpoint of any kind (savepoints included), read by gauges
    latest_completed: Option<Arc<CompletedCheckpointStats>>,

    restore: Option<RestoreGeneration>,
    generations_opened: u64,
    latest_restored: Option<RestoredCheckpointStats>,
    latest_initialization: Option<JobInitializationStats>,

    /// Set by every mutation, cleared when a snapshot is built
    dirty: bool,
    snapshot: Option<Arc<CheckpointStatsSnapshot>>,
}

impl TrackerState {
    fn new(config: &CheckpointStatsConfig) -> Self {
        Self {
            counts: CheckpointStatsCounts::default(),
            summary: CompletedCheckpointStatsSummary::default(),
            history: CheckpointStatsHistory::new(config.history_size),
            pending: HashMap::new(),
            last_checkpoint_id: None,
            latest_completed: None,
            restore: None,
            generations_opened: 0,
            latest_restored: None,
            latest_initialization: None,
            dirty: true,
            snapshot: None,
        }
    }

    fn take_pending(&mut self, checkpoint_id: CheckpointId) -> Result<Arc<PendingCheckpointStats>> {
        self.pending.remove(&checkpoint_id).ok_or_else(|| {
            warn!(checkpoint_id, "Terminal stats reported for unknown checkpoint");
            CheckpointStatsError::UnknownCheckpoint(checkpoint_id)
        })
    }

    fn complete_restore(&mut self) -> Option<JobInitializationStats> {
        let stats = self.restore.as_mut()?.try_complete()?;
        self.latest_initialization = Some(stats.clone());
        Some(stats)
    }

    fn build_snapshot(&self) -> CheckpointStatsSnapshot {
        CheckpointStatsSnapshot::new(
            self.counts,
            self.summary.snapshot(),
            self.history.clone(),
            self.latest_restored.clone(),
            self.latest_initialization.clone(),
        )
    }
}

/// Tracks checkpoint statistics for one job.
///
/// The checkpoint coordinator is the only caller of the `report_*` methods
/// that change checkpoint state and must not call them concurrently with
/// each other. Subtask and initialization reports, snapshots and gauge reads
/// are safe from any thread at any time.
pub struct CheckpointStatsTracker {
    state: Arc<Mutex<TrackerState>>,
    reporter: Arc<dyn StatsReporter>,
    listener: Arc<dyn CheckpointStatsListener>,
}

impl CheckpointStatsTracker {
    /// Create a tracker and register its gauges with `reporter`.
    pub fn new(config: CheckpointStatsConfig, reporter: Arc<dyn StatsReporter>) -> Self {
        Self::with_listener(config, reporter, Arc::new(NoOpListener))
    }

    pub fn with_listener(
        config: CheckpointStatsConfig,
        reporter: Arc<dyn StatsReporter>,
        listener: Arc<dyn CheckpointStatsListener>,
    ) -> Self {
        let tracker = Self {
            state: Arc::new(Mutex::new(TrackerState::new(&config))),
            reporter,
            listener,
        };
        tracker.register_metrics();
        tracker
    }

    /// Register a newly triggered checkpoint.
    ///
    /// `subtasks_by_vertex` maps every participating task group to the number
    /// of subtasks expected to acknowledge. The returned handle accepts the
    /// subtask reports and is later turned into a terminal record.
    pub fn report_pending_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
        trigger_timestamp: Timestamp,
        properties: CheckpointProperties,
        subtasks_by_vertex: &HashMap<JobVertexId, usize>,
    ) -> Result<Arc<PendingCheckpointStats>> {
        let mut state = self.state.lock();

        if let Some(last) = state.last_checkpoint_id {
            if checkpoint_id <= last {
                warn!(checkpoint_id, last, "Non-increasing checkpoint id");
                return Err(CheckpointStatsError::NonMonotonicCheckpointId {
                    id: checkpoint_id,
                    last,
                });
            }
        }

        let pending = Arc::new(PendingCheckpointStats::new(
            checkpoint_id,
            trigger_timestamp,
            properties,
            subtasks_by_vertex,
        ));

        state.last_checkpoint_id = Some(checkpoint_id);
        state.counts.increment_in_progress_checkpoints();
        state.history.add_in_progress(pending.clone());
        state.pending.insert(checkpoint_id, pending.clone());
        state.dirty = true;
        drop(state);

        debug!(
            checkpoint_id,
            trigger_timestamp,
            checkpoint_type = properties.type_name(),
            subtasks = pending.total_subtask_count(),
            "Checkpoint pending"
        );
        Ok(pending)
    }

    /// Route a subtask report to the pending checkpoint with the given id.
    ///
    /// Returns `false` if the checkpoint is not in progress or the report
    /// was rejected by the pending record. Like a report made on the pending
    /// handle, this leaves the cached snapshot in place: its in-progress entry
    /// is the same shared record and shows the acknowledgement.
    pub fn report_subtask_stats(
        &self,
        checkpoint_id: CheckpointId,
        job_vertex_id: JobVertexId,
        stats: SubtaskStateStats,
    ) -> bool {
        let Some(pending) = self.pending_checkpoint(checkpoint_id) else {
            debug!(checkpoint_id, "Ignoring subtask report for checkpoint not in progress");
            return false;
        };
        pending.report_subtask_stats(job_vertex_id, stats)
    }

    /// The in-progress checkpoint with the given id.
    pub fn pending_checkpoint(&self, checkpoint_id: CheckpointId) -> Option<Arc<PendingCheckpointStats>> {
        self.state.lock().pending.get(&checkpoint_id).cloned()
    }

    /// Record a completed checkpoint.
    pub fn report_completed_checkpoint(&self, completed: CompletedCheckpointStats) -> Result<()> {
        let completed = Arc::new(completed);
        let checkpoint_id = completed.checkpoint_id();
        {
            let mut state = self.state.lock();
            state.take_pending(checkpoint_id)?;

            state.counts.increment_completed_checkpoints();
            state.summary.update(&completed);
            state
                .history
                .add_terminal(CheckpointStats::Completed(completed.clone()));
            if state
                .latest_completed
                .as_ref()
                .map_or(true, |c| checkpoint_id > c.checkpoint_id())
            {
                state.latest_completed = Some(completed.clone());
            }
            state.dirty = true;
        }

        info!(
            checkpoint_id,
            checkpoint_type = completed.properties().type_name(),
            duration_ms = completed.end_to_end_duration(),
            checkpointed_size = completed.checkpointed_size(),
            full_size = completed.state_size(),
            unaligned = completed.is_unaligned(),
            "Checkpoint completed"
        );

        let attributes = checkpoint_attributes(&completed);
        self.reporter.add_span(
            Span::new(STATS_SCOPE, CHECKPOINT_SPAN)
                .with_interval(completed.trigger_timestamp(), completed.latest_ack_timestamp())
                .with_attributes(attributes.clone()),
        );
        self.reporter.add_event(
            Event::new(STATS_SCOPE, CHECKPOINT_EVENT, completed.latest_ack_timestamp())
                .with_attributes(attributes),
        );
        self.listener.on_completed_checkpoint();
        Ok(())
    }

    /// Record a failed checkpoint. Failed checkpoints do not enter the summary.
    pub fn report_failed_checkpoint(&self, failed: FailedCheckpointStats) -> Result<()> {
        let failed = Arc::new(failed);
        let checkpoint_id = failed.checkpoint_id();
        {
            let mut state = self.state.lock();
            state.take_pending(checkpoint_id)?;

            state.counts.increment_failed_checkpoints();
            state
                .history
                .add_terminal(CheckpointStats::Failed(failed.clone()));
            state.dirty = true;
        }

        info!(
            checkpoint_id,
            checkpoint_type = failed.properties().type_name(),
            failure_timestamp = failed.failure_timestamp(),
            acknowledged = failed.num_acknowledged_subtasks(),
            total = failed.total_subtask_count(),
            cause = failed.failure_message().unwrap_or("unknown"),
            "Checkpoint failed"
        );
        self.listener.on_failed_checkpoint();
        Ok(())
    }

    /// Count a checkpoint that failed before it was ever in progress,
    /// e.g. because triggering it failed.
    pub fn report_failed_checkpoints_without_in_progress(&self) {
        {
            let mut state = self.state.lock();
            state
                .counts
                .increment_failed_checkpoints_without_in_progress();
            state.dirty = true;
        }
        info!("Checkpoint failed before it was in progress");
        self.listener.on_failed_checkpoint();
    }

    /// Open a new restore generation, discarding an unfinished previous one.
    pub fn report_initialization_started(
        &self,
        expected_attempts: HashSet<ExecutionAttemptId>,
        start_ts: Timestamp,
    ) {
        let mut state = self.state.lock();
        if let Some(previous) = state.restore.as_ref().filter(|r| !r.is_complete()) {
            debug!(
                generation = previous.generation(),
                missing_attempts = previous.num_pending(),
                "Discarding unfinished restore generation"
            );
        }

        state.generations_opened += 1;
        let generation = state.generations_opened;
        let attempts = expected_attempts.len();
        state.restore = Some(RestoreGeneration::new(generation, expected_attempts, start_ts));
        state.dirty = true;
        drop(state);

        debug!(generation, attempts, start_ts, "Initialization started");
    }

    /// Attribute initialization metrics to an attempt of the current generation.
    ///
    /// Returns `false` if the attempt does not belong to the current
    /// generation, already reported, or the generation already completed.
    pub fn report_initialization_metrics(
        &self,
        attempt: ExecutionAttemptId,
        metrics: SubTaskInitializationMetrics,
    ) -> bool {
        let completed = {
            let mut state = self.state.lock();
            let accepted = match state.restore.as_mut() {
                Some(restore) => restore.record_metrics(attempt, metrics),
                None => false,
            };
            if !accepted {
                debug!(%attempt, "Ignoring initialization metrics outside the current generation");
                return false;
            }
            state.dirty = true;
            state.complete_restore()
        };

        if let Some(stats) = completed {
            self.emit_initialization(&stats);
        }
        true
    }

    /// Record the checkpoint the current restore generation starts from.
    pub fn report_restored_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
        properties: CheckpointProperties,
        external_path: Option<String>,
        state_size: u64,
    ) -> Result<()> {
        let completed = {
            let mut state = self.state.lock();
            let Some(restore) = state.restore.as_mut() else {
                warn!(checkpoint_id, "Restored checkpoint reported before initialization started");
                return Err(CheckpointStatsError::NoInitializationInProgress(checkpoint_id));
            };

            let restored = RestoredCheckpointStats {
                checkpoint_id,
                properties,
                restore_timestamp: restore.start_ts(),
                external_path,
                state_size,
            };
            restore.attach_restored(restored.clone());

            state.counts.increment_restored_checkpoints();
            state.latest_restored = Some(restored);
            state.dirty = true;
            state.complete_restore()
        };

        info!(checkpoint_id, state_size, "Restored checkpoint");
        if let Some(stats) = completed {
            self.emit_initialization(&stats);
        }
        Ok(())
    }

    /// Current statistics. Repeated calls without an intervening report
    /// return the same `Arc`.
    pub fn create_snapshot(&self) -> Arc<CheckpointStatsSnapshot> {
        let mut state = self.state.lock();
        if !state.dirty {
            if let Some(snapshot) = &state.snapshot {
                return snapshot.clone();
            }
        }

        let snapshot = Arc::new(state.build_snapshot());
        state.snapshot = Some(snapshot.clone());
        state.dirty = false;
        snapshot
    }

    fn emit_initialization(&self, stats: &JobInitializationStats) {
        info!(
            generation = stats.generation,
            checkpoint_id = stats.checkpoint_id,
            duration_ms = stats.end_ts.saturating_sub(stats.start_ts),
            attempts = stats.num_attempts,
            status = stats.status.as_str(),
            "Initialization completed"
        );
        self.reporter.add_span(stats.to_span(STATS_SCOPE));
    }

    fn register_metrics(&self) {
        let state = Arc::downgrade(&self.state);
        let r = &self.reporter;

        r.gauge(
            NUMBER_OF_CHECKPOINTS_METRIC,
            long_gauge(&state, 0, |s| Some(s.counts.total_number_of_checkpoints())),
        );
        r.gauge(
            NUMBER_OF_IN_PROGRESS_CHECKPOINTS_METRIC,
            long_gauge(&state, 0, |s| Some(s.counts.number_of_in_progress_checkpoints())),
        );
        r.gauge(
            NUMBER_OF_COMPLETED_CHECKPOINTS_METRIC,
            long_gauge(&state, 0, |s| Some(s.counts.number_of_completed_checkpoints())),
        );
        r.gauge(
            NUMBER_OF_FAILED_CHECKPOINTS_METRIC,
            long_gauge(&state, 0, |s| Some(s.counts.number_of_failed_checkpoints())),
        );
        r.gauge(
            LATEST_RESTORED_CHECKPOINT_TIMESTAMP_METRIC,
            long_gauge(&state, -1, |s| {
                s.latest_restored.as_ref().map(|r| r.restore_timestamp)
            }),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_SIZE_METRIC,
            latest_completed_gauge(&state, |c| c.checkpointed_size()),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_METADATA_SIZE_METRIC,
            latest_completed_gauge(&state, |c| c.metadata_size()),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_FULL_SIZE_METRIC,
            latest_completed_gauge(&state, |c| c.state_size()),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_DURATION_METRIC,
            latest_completed_gauge(&state, |c| c.end_to_end_duration()),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_PROCESSED_DATA_METRIC,
            latest_completed_gauge(&state, |c| c.processed_data()),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_PERSISTED_DATA_METRIC,
            latest_completed_gauge(&state, |c| c.persisted_data()),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_EXTERNAL_PATH_METRIC,
            external_path_gauge(&state),
        );
        r.gauge(
            LATEST_COMPLETED_CHECKPOINT_ID_METRIC,
            latest_completed_gauge(&state, |c| c.checkpoint_id()),
        );
        r.gauge(
            LATEST_CHECKPOINT_COMPLETED_TIMESTAMP_METRIC,
            latest_completed_gauge(&state, |c| c.latest_ack_timestamp()),
        );
    }
}

// ============================================================================
// Gauges
// ============================================================================

fn to_long(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Gauge reading live tracker state. Reads `default` when there is no value
/// or the tracker is gone.
fn long_gauge<F>(state: &Weak<Mutex<TrackerState>>, default: i64, read: F) -> Gauge
where
    F: Fn(&TrackerState) -> Option<u64> + Send + Sync + 'static,
{
    let state = state.clone();
    Box::new(move || {
        let value = state
            .upgrade()
            .and_then(|state| {
                let state = state.lock();
                read(&*state)
            })
            .map_or(default, to_long);
        GaugeValue::Long(value)
    })
}

fn latest_completed_gauge<F>(state: &Weak<Mutex<TrackerState>>, read: F) -> Gauge
where
    F: Fn(&CompletedCheckpointStats) -> u64 + Send + Sync + 'static,
{
    long_gauge(state, -1, move |s| s.latest_completed.as_deref().map(&read))
}

fn external_path_gauge(state: &Weak<Mutex<TrackerState>>) -> Gauge {
    let state = state.clone();
    Box::new(move || {
        let path = state.upgrade().and_then(|state| {
            let state = state.lock();
            state
                .latest_completed
                .as_ref()
                .and_then(|c| c.external_pointer().map(str::to_string))
        });
        GaugeValue::Text(path.unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    })
}

/// Attributes shared by the span and the event of a completed checkpoint.
fn checkpoint_attributes(completed: &CompletedCheckpointStats) -> BTreeMap<String, AttributeValue> {
    BTreeMap::from([
        ("checkpointId".to_string(), completed.checkpoint_id().into()),
        (
            "checkpointType".to_string(),
            completed.properties().type_name().into(),
        ),
        (
            "isUnaligned".to_string(),
            completed.is_unaligned().to_string().into(),
        ),
        (
            "checkpointStatus".to_string(),
            completed.status().to_string().into(),
        ),
        ("fullSize".to_string(), completed.state_size().into()),
        (
            "checkpointedSize".to_string(),
            completed.checkpointed_size().into(),
        ),
        ("metadataSize".to_string(), completed.metadata_size().into()),
        ("processedData".to_string(), completed.processed_data().into()),
        ("persistedData".to_string(), completed.persisted_data().into()),
    ])
}
