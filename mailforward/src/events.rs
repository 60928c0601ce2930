//! Lifecycle events emitted while a forwarding run progresses.
//!
//! The pipeline reports each transition to an [`EventSink`]. Sinks never
//! fail the run: whatever they do with an event stays on their side.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, Level};

/// A run started.
pub const RUN_STARTED: &str = "forward.started";
/// A stage returned successfully.
pub const STAGE_COMPLETED: &str = "forward.stage.completed";
/// A stage failed.
pub const STAGE_FAILED: &str = "forward.stage.failed";
/// A stage ended the run early without error.
pub const RUN_FINISHED_EARLY: &str = "forward.finished_early";
/// Every stage completed.
pub const RUN_COMPLETED: &str = "forward.completed";
/// The run failed.
pub const RUN_FAILED: &str = "forward.failed";

/// Receives run lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    ///
    /// * `event_type` - one of the `forward.*` constants in this module
    /// * `data` - optional structured payload
    async fn emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to the tracing log.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`. Levels other than `DEBUG` log at `INFO`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates an info-level sink.
    #[must_use]
    pub const fn info() -> Self {
        Self::new(Level::INFO)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        if self.level == Level::DEBUG {
            debug!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        }
    }
}

/// Keeps every event in memory. Used by tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Returns the collected event types, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}
