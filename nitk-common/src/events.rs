//! Event types for the NITK event system
//!
//! Provides the pipeline lifecycle events and the EventBus used to fan them
//! out to SSE clients, tests and other in-process observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Pipeline lifecycle events
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. Result payloads for dashboards travel over the live
/// WebSocket channel instead; these events only describe what the pipeline
/// is doing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum IngestEvent {
    /// Watcher and worker are running for a directory
    MonitoringStarted {
        watch_directory: String,
        timestamp: DateTime<Utc>,
    },

    /// Monitoring stopped on request
    MonitoringStopped {
        watch_directory: String,
        timestamp: DateTime<Utc>,
    },

    /// Watched directory vanished; the watch session is over
    WatchLost {
        watch_directory: String,
        timestamp: DateTime<Utc>,
    },

    /// A new recording settled in the watched directory
    FileDetected {
        file_path: String,
        timestamp: DateTime<Utc>,
    },

    /// An arrival was discarded before processing
    FileSkipped {
        file_path: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The worker picked up a file
    ProcessingStarted {
        file_path: String,
        timestamp: DateTime<Utc>,
    },

    /// The file was analyzed, persisted and broadcast
    ProcessingCompleted {
        file_path: String,
        result_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Processing failed; nothing was persisted for this file
    FileFailed {
        file_path: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Retention sweep finished
    RetentionSweep {
        removed: u64,
        timestamp: DateTime<Utc>,
    },
}

impl IngestEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            IngestEvent::MonitoringStarted { .. } => "MonitoringStarted",
            IngestEvent::MonitoringStopped { .. } => "MonitoringStopped",
            IngestEvent::WatchLost { .. } => "WatchLost",
            IngestEvent::FileDetected { .. } => "FileDetected",
            IngestEvent::FileSkipped { .. } => "FileSkipped",
            IngestEvent::ProcessingStarted { .. } => "ProcessingStarted",
            IngestEvent::ProcessingCompleted { .. } => "ProcessingCompleted",
            IngestEvent::FileFailed { .. } => "FileFailed",
            IngestEvent::RetentionSweep { .. } => "RetentionSweep",
        }
    }

    /// When the event happened
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            IngestEvent::MonitoringStarted { timestamp, .. }
            | IngestEvent::MonitoringStopped { timestamp, .. }
            | IngestEvent::WatchLost { timestamp, .. }
            | IngestEvent::FileDetected { timestamp, .. }
            | IngestEvent::FileSkipped { timestamp, .. }
            | IngestEvent::ProcessingStarted { timestamp, .. }
            | IngestEvent::ProcessingCompleted { timestamp, .. }
            | IngestEvent::FileFailed { timestamp, .. }
            | IngestEvent::RetentionSweep { timestamp, .. } => *timestamp,
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use nitk_common::events::{EventBus, IngestEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(IngestEvent::FileDetected {
///     file_path: "/data/ch1_0001.tdms".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(IngestEvent::FileDetected { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IngestEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// `capacity` is the number of events buffered before the oldest are
    /// dropped for lagging receivers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IngestEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
