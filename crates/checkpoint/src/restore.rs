//! Restore (job initialization) tracking across failover generations.
//!
//! Each restart opens a new generation with the set of execution attempts
//! expected to report initialization metrics. A generation completes once
//! every expected attempt reported and the restored checkpoint is known;
//! it then yields one consolidated [`JobInitializationStats`]. Opening a new
//! generation drops an unfinished one together with everything it collected.

use bicycle_core::{CheckpointId, ExecutionAttemptId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::reporter::Span;
use crate::stats::RestoredCheckpointStats;

/// Span name for a completed restore generation.
pub const JOB_INITIALIZATION_SPAN: &str = "JobInitialization";

/// Outcome of a subtask's initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitializationStatus {
    Completed,
    Failed,
}

impl InitializationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

/// Initialization metrics of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskInitializationMetrics {
    pub initialization_start_ts: Timestamp,
    pub initialization_end_ts: Timestamp,
    /// Named phase durations in milliseconds, e.g. `InitializeStateDurationMs`.
    pub duration_metrics: BTreeMap<String, u64>,
    pub status: InitializationStatus,
}

/// Builder for [`SubTaskInitializationMetrics`].
#[derive(Debug, Clone)]
pub struct SubTaskInitializationMetricsBuilder {
    initialization_start_ts: Timestamp,
    duration_metrics: BTreeMap<String, u64>,
    status: InitializationStatus,
}

impl SubTaskInitializationMetricsBuilder {
    pub fn new(initialization_start_ts: Timestamp) -> Self {
        Self {
            initialization_start_ts,
            duration_metrics: BTreeMap::new(),
            status: InitializationStatus::Failed,
        }
    }

    pub fn with_status(mut self, status: InitializationStatus) -> Self {
        self.status = status;
        self
    }

    /// Add to a named duration. Repeated names accumulate.
    pub fn add_duration_metric(&mut self, name: impl Into<String>, value: u64) {
        let total = self.duration_metrics.entry(name.into()).or_insert(0);
        *total = total.saturating_add(value);
    }

    pub fn with_duration_metric(mut self, name: impl Into<String>, value: u64) -> Self {
        self.add_duration_metric(name, value);
        self
    }

    pub fn build(self, initialization_end_ts: Timestamp) -> SubTaskInitializationMetrics {
        SubTaskInitializationMetrics {
            initialization_start_ts: self.initialization_start_ts,
            initialization_end_ts,
            duration_metrics: self.duration_metrics,
            status: self.status,
        }
    }
}

/// Max and sum of one named duration across attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationAggregate {
    pub max: u64,
    pub sum: u64,
}

/// Consolidated record of a completed restore generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInitializationStats {
    pub generation: u64,
    pub checkpoint_id: CheckpointId,
    pub state_size: u64,
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
    pub status: InitializationStatus,
    pub num_attempts: usize,
    pub duration_metrics: BTreeMap<String, DurationAggregate>,
}

impl JobInitializationStats {
    pub fn to_span(&self, scope: &'static str) -> Span {
        let mut span = Span::new(scope, JOB_INITIALIZATION_SPAN)
            .with_interval(self.start_ts, self.end_ts)
            .with_attribute("checkpointId", self.checkpoint_id)
            .with_attribute("fullSize", self.state_size)
            .with_attribute("initializationStatus", self.status.as_str());
        for (name, agg) in &self.duration_metrics {
            span = span
                .with_attribute(format!("Max{}", name), agg.max)
                .with_attribute(format!("Sum{}", name), agg.sum);
        }
        span
    }
}

/// One restore generation.
#[derive(Debug)]
pub(crate) struct RestoreGeneration {
    generation: u64,
    start_ts: Timestamp,
    expected: HashSet<ExecutionAttemptId>,
    reported: HashMap<ExecutionAttemptId, SubTaskInitializationMetrics>,
    restored: Option<RestoredCheckpointStats>,
    completed: bool,
}

impl RestoreGeneration {
    pub(crate) fn new(
        generation: u64,
        expected: HashSet<ExecutionAttemptId>,
        start_ts: Timestamp,
    ) -> Self {
        Self {
            generation,
            start_ts,
            reported: HashMap::with_capacity(expected.len()),
            expected,
            restored: None,
            completed: false,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completed
    }

    pub(crate) fn num_pending(&self) -> usize {
        self.expected.len() - self.reported.len()
    }

    /// Attribute metrics to an attempt of this generation.
    ///
    /// Returns `false` for attempts outside the generation, repeated reports
    /// and reports after completion.
    pub(crate) fn record_metrics(
        &mut self,
        attempt: ExecutionAttemptId,
        metrics: SubTaskInitializationMetrics,
    ) -> bool {
        if self.completed || !self.expected.contains(&attempt) || self.reported.contains_key(&attempt) {
            return false;
        }
        self.reported.insert(attempt, metrics);
        true
    }

    pub(crate) fn attach_restored(&mut self, restored: RestoredCheckpointStats) {
        self.restored = Some(restored);
    }

    /// Complete the generation if all attempts reported and the restored
    /// checkpoint is known. Yields the consolidated record exactly once.
    pub(crate) fn try_complete(&mut self) -> Option<JobInitializationStats> {
        if self.completed || self.reported.len() < self.expected.len() {
            return None;
        }
        let restored = self.restored.as_ref()?;
        self.completed = true;

        let end_ts = self
            .reported
            .values()
            .map(|m| m.initialization_end_ts)
            .max()
            .unwrap_or(self.start_ts);
        let status = if self
            .reported
            .values()
            .all(|m| m.status == InitializationStatus::Completed)
        {
            InitializationStatus::Completed
        } else {
            InitializationStatus::Failed
        };

        let mut duration_metrics: BTreeMap<String, DurationAggregate> = BTreeMap::new();
        for metrics in self.reported.values() {
            for (name, value) in &metrics.duration_metrics {
                let agg = duration_metrics.entry(name.clone()).or_default();
                agg.max = agg.max.max(*value);
                agg.sum = agg.sum.saturating_add(*value);
            }
        }

        Some(JobInitializationStats {
            generation: self.generation,
            checkpoint_id: restored.checkpoint_id,
            state_size: restored.state_size,
            start_ts: self.start_ts,
            end_ts,
            status,
            num_attempts: self.reported.len(),
            duration_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckpointProperties, RetentionPolicy};

    fn restored(id: CheckpointId) -> RestoredCheckpointStats {
        RestoredCheckpointStats {
            checkpoint_id: id,
            properties: CheckpointProperties::for_checkpoint(RetentionPolicy::RetainOnFailure),
            restore_timestamp: 100,
            external_path: None,
            state_size: 1024,
        }
    }

    fn metrics(end_ts: Timestamp, state_ms: u64) -> SubTaskInitializationMetrics {
        SubTaskInitializationMetricsBuilder::new(110)
            .with_status(InitializationStatus::Completed)
            .with_duration_metric("MailboxStartDurationMs", 10)
            .with_duration_metric("InitializeStateDurationMs", state_ms)
            .build(end_ts)
    }

    #[test]
    fn test_completes_after_all_attempts_and_restored() {
        let a = ExecutionAttemptId::random();
        let b = ExecutionAttemptId::random();
        let mut generation = RestoreGeneration::new(1, HashSet::from([a, b]), 100);

        assert!(generation.record_metrics(a, metrics(215, 30)));
        assert!(generation.try_complete().is_none());
        assert!(generation.record_metrics(b, metrics(250, 50)));
        assert!(generation.try_complete().is_none());

        generation.attach_restored(restored(42));
        let stats = generation.try_complete().unwrap();
        assert_eq!(stats.checkpoint_id, 42);
        assert_eq!(stats.start_ts, 100);
        assert_eq!(stats.end_ts, 250);
        assert_eq!(stats.num_attempts, 2);
        assert_eq!(stats.status, InitializationStatus::Completed);
        assert_eq!(
            stats.duration_metrics["InitializeStateDurationMs"],
            DurationAggregate { max: 50, sum: 80 }
        );

        assert!(generation.is_complete());
        assert!(generation.try_complete().is_none());
        assert!(!generation.record_metrics(a, metrics(300, 1)));
    }

    #[test]
    fn test_rejects_foreign_and_repeated_attempts() {
        let a = ExecutionAttemptId::random();
        let mut generation = RestoreGeneration::new(1, HashSet::from([a]), 0);

        assert!(!generation.record_metrics(ExecutionAttemptId::random(), metrics(5, 1)));
        assert!(generation.record_metrics(a, metrics(5, 1)));
        assert!(!generation.record_metrics(a, metrics(9, 1)));
        assert_eq!(generation.num_pending(), 0);
    }

    #[test]
    fn test_empty_generation_ends_at_start() {
        let mut generation = RestoreGeneration::new(3, HashSet::new(), 123);
        assert!(generation.try_complete().is_none());

        generation.attach_restored(restored(81));
        let stats = generation.try_complete().unwrap();
        assert_eq!(stats.end_ts, 123);
        assert_eq!(stats.num_attempts, 0);
    }

    #[test]
    fn test_any_failed_attempt_fails_generation() {
        let a = ExecutionAttemptId::random();
        let mut generation = RestoreGeneration::new(1, HashSet::from([a]), 0);
        generation.record_metrics(a, SubTaskInitializationMetricsBuilder::new(0).build(10));
        generation.attach_restored(restored(1));

        assert_eq!(generation.try_complete().unwrap().status, InitializationStatus::Failed);
    }

    #[test]
    fn test_duration_sums_saturate() {
        let a = ExecutionAttemptId::random();
        let b = ExecutionAttemptId::random();
        let mut generation = RestoreGeneration::new(1, HashSet::from([a, b]), 0);
        let huge = SubTaskInitializationMetricsBuilder::new(0)
            .with_duration_metric("InitializeStateDurationMs", u64::MAX)
            .with_duration_metric("InitializeStateDurationMs", 1)
            .build(5);
        generation.record_metrics(a, huge);
        generation.record_metrics(b, metrics(5, 1));
        generation.attach_restored(restored(1));

        let stats = generation.try_complete().unwrap();
        assert_eq!(
            stats.duration_metrics["InitializeStateDurationMs"],
            DurationAggregate { max: u64::MAX, sum: u64::MAX }
        );
    }

    #[test]
    fn test_span_attributes() {
        let a = ExecutionAttemptId::random();
        let mut generation = RestoreGeneration::new(1, HashSet::from([a]), 100);
        generation.record_metrics(a, metrics(215, 30));
        generation.attach_restored(restored(42));

        let span = generation.try_complete().unwrap().to_span("test");
        assert_eq!(span.name, JOB_INITIALIZATION_SPAN);
        assert_eq!(span.start_ts_millis, 100);
        assert_eq!(span.end_ts_millis, 215);
        assert_eq!(span.attribute("checkpointId").and_then(|v| v.as_long()), Some(42));
        assert_eq!(span.attribute("fullSize").and_then(|v| v.as_long()), Some(1024));
        assert_eq!(
            span.attribute("MaxInitializeStateDurationMs").and_then(|v| v.as_long()),
            Some(30)
        );
        assert_eq!(
            span.attribute("initializationStatus").and_then(|v| v.as_text()),
            Some("COMPLETED")
        );
    }
}
