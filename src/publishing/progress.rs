//! Progress reporting
//!
//! Best-effort delivery of status notifications to an optional observer.
//! Reporting never fails the caller: a missing observer, an unknown event
//! kind or an observer that rejects the event all degrade to "not
//! delivered".

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Kind of a progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Progress,
    Error,
}

impl ProgressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressKind::Progress => "progress",
            ProgressKind::Error => "error",
        }
    }

    /// Parse a wire name; anything but `progress` or `error` is rejected
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "progress" => Some(ProgressKind::Progress),
            "error" => Some(ProgressKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors an observer may return from [`ProgressObserver::emit`]
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("observer channel closed")]
    Closed,

    #[error("observer rejected event: {0}")]
    Rejected(String),
}

/// Sink for progress notifications
pub trait ProgressObserver: Send + Sync {
    fn emit(&self, event: &ProgressEvent) -> Result<(), ObserverError>;
}

/// Deliver `message` to `observer`. Returns whether it was delivered.
pub fn report(
    observer: Option<&dyn ProgressObserver>,
    kind: ProgressKind,
    message: &str,
) -> bool {
    let Some(observer) = observer else {
        return false;
    };

    match observer.emit(&ProgressEvent::new(kind, message)) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, kind = %kind, "progress event dropped");
            false
        }
    }
}

/// Like [`report`], with the kind given by name. Unknown kinds are skipped.
pub fn report_raw(observer: Option<&dyn ProgressObserver>, kind: &str, message: &str) -> bool {
    match ProgressKind::parse(kind) {
        Some(kind) => report(observer, kind, message),
        None => {
            debug!(kind, "unknown progress kind skipped");
            false
        }
    }
}

/// Forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn emit(&self, event: &ProgressEvent) -> Result<(), ObserverError> {
        self.sender
            .send(event.clone())
            .map_err(|_| ObserverError::Closed)
    }
}

/// Writes events to the `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ProgressObserver for LoggingObserver {
    fn emit(&self, event: &ProgressEvent) -> Result<(), ObserverError> {
        match event.kind {
            ProgressKind::Progress => info!(message = %event.message, "publish progress"),
            ProgressKind::Error => warn!(message = %event.message, "publish error"),
        }
        Ok(())
    }
}
