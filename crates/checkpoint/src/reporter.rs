//! Outbound seams: metrics/tracing backend and checkpoint listener.
//!
//! The tracker only produces values. Registering gauges with a metrics
//! system, shipping spans and events to a tracing backend, and reacting to
//! checkpoint completion are left to implementations of these traits.

use bicycle_core::Timestamp;
use std::collections::BTreeMap;
use std::fmt;

/// Value read from a gauge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GaugeValue {
    Long(i64),
    Text(String),
}

impl GaugeValue {
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            Self::Long(_) => None,
        }
    }
}

/// A gauge reads its current value on every call.
pub type Gauge = Box<dyn Fn() -> GaugeValue + Send + Sync>;

/// Attribute attached to a span or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Long(i64),
    Text(String),
}

impl AttributeValue {
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            Self::Long(_) => None,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        Self::Long(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

/// A finished span handed to the tracing backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub scope: &'static str,
    pub name: &'static str,
    pub start_ts_millis: Timestamp,
    pub end_ts_millis: Timestamp,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Span {
    pub fn new(scope: &'static str, name: &'static str) -> Self {
        Self {
            scope,
            name,
            start_ts_millis: 0,
            end_ts_millis: 0,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_interval(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.start_ts_millis = start;
        self.end_ts_millis = end;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, AttributeValue>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// A structured event handed to the eventing backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub scope: &'static str,
    pub name: &'static str,
    pub observed_ts_millis: Timestamp,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Event {
    pub fn new(scope: &'static str, name: &'static str, observed_ts_millis: Timestamp) -> Self {
        Self {
            scope,
            name,
            observed_ts_millis,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Sink for gauges, spans and events.
pub trait StatsReporter: Send + Sync {
    /// Register a gauge under `name`. Called once per gauge at tracker construction.
    fn gauge(&self, name: &'static str, gauge: Gauge);

    fn add_span(&self, span: Span);

    fn add_event(&self, event: Event);
}

/// Reporter that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpReporter;

impl StatsReporter for NoOpReporter {
    fn gauge(&self, _name: &'static str, _gauge: Gauge) {}

    fn add_span(&self, _span: Span) {}

    fn add_event(&self, _event: Event) {}
}

/// Callbacks fired synchronously when a checkpoint reaches a terminal state.
pub trait CheckpointStatsListener: Send + Sync {
    fn on_completed_checkpoint(&self) {}

    fn on_failed_checkpoint(&self) {}
}

/// Listener that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpListener;

impl CheckpointStatsListener for NoOpListener {}
