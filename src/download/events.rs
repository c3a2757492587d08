//! Progress and log events emitted by the engine.
//!
//! The engine never talks to a UI directly. It pushes [`EngineEvent`]s onto an
//! unbounded channel and whatever presentation layer exists drains them on its
//! own task. Every log event is also mirrored to `tracing`.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Severity of a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Normal progress (successful download, cancellation summary).
    Info,
    /// Recoverable trouble (a retry is scheduled).
    Warning,
    /// Terminal failure of an item.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Emitted once per item reaching a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Items finished so far; never decreases across events.
    pub completed: usize,
    /// Items in the batch.
    pub total: usize,
    /// Resolved name of the item, or its reference when no name was resolved.
    pub label: String,
}

/// A human-readable log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
}

/// Everything the engine reports while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineEvent {
    /// Item finished.
    Progress(ProgressEvent),
    /// Log line.
    Log(LogEvent),
}

/// Sending half of the event channel.
pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiving half of the event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Creates a new event channel.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Engine-side handle that tolerates a missing or closed receiver.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<EventSender>,
}

impl EventSink {
    pub(crate) fn new(tx: Option<EventSender>) -> Self {
        Self { tx }
    }

    pub(crate) fn progress(&self, completed: usize, total: usize, label: &str) {
        self.send(EngineEvent::Progress(ProgressEvent {
            completed,
            total,
            label: label.to_string(),
        }));
    }

    pub(crate) fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!(target: "image_downloader::events", "{message}"),
            LogLevel::Warning => warn!(target: "image_downloader::events", "{message}"),
            LogLevel::Error => error!(target: "image_downloader::events", "{message}"),
        }
        self.send(EngineEvent::Log(LogEvent { level, message }));
    }

    pub(crate) fn info(&self, message: String) {
        self.log(LogLevel::Info, message);
    }

    pub(crate) fn warning(&self, message: String) {
        self.log(LogLevel::Warning, message);
    }

    pub(crate) fn error(&self, message: String) {
        self.log(LogLevel::Error, message);
    }

    fn send(&self, event: EngineEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening; the batch carries on.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_forwards_events_in_order() {
        let (tx, mut rx) = event_channel();
        let sink = EventSink::new(Some(tx));

        sink.info("one".to_string());
        sink.progress(1, 2, "a.jpg");
        sink.error("two".to_string());

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Log(LogEvent {
                level: LogLevel::Info,
                message: "one".to_string()
            })
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Progress(ProgressEvent {
                completed: 1,
                total: 2,
                label: "a.jpg".to_string()
            })
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::Log(LogEvent { level: LogLevel::Error, .. })
        ));
    }

    #[test]
    fn test_sink_ignores_closed_receiver() {
        let (tx, rx) = event_channel();
        drop(rx);
        let sink = EventSink::new(Some(tx));
        sink.warning("nobody listening".to_string());
        sink.progress(1, 1, "x");
    }

    #[test]
    fn test_sink_without_channel_is_noop() {
        let sink = EventSink::default();
        sink.info("quiet".to_string());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EngineEvent::Log(LogEvent {
            level: LogLevel::Warning,
            message: "retry".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"log\""));
        assert!(json.contains("\"level\":\"warning\""));
    }
}
