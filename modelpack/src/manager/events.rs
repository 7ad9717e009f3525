//! Progress and log events delivered to installer observers.
//!
//! Observers are called synchronously from the run task, so events arrive in
//! the order they were produced.

use std::fmt;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use super::download::{PartProgress, TransferProgress};

/// Lifecycle phase of an install run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallPhase {
    /// No run has started.
    #[default]
    Idle,
    /// Discovering archive parts.
    Resolving,
    /// Transferring parts to staging.
    Downloading,
    /// Running the external archiver.
    Extracting,
    /// Checking the extracted output.
    Verifying,
    /// Run finished successfully.
    Done,
    /// Run finished with an error.
    Failed,
    /// Run was stopped by the caller.
    Cancelled,
}

impl InstallPhase {
    /// Get a human-readable name for the phase.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Resolving => "Resolving",
            Self::Downloading => "Downloading",
            Self::Extracting => "Extracting",
            Self::Verifying => "Verifying",
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the run has reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Phase the run is in.
    pub phase: InstallPhase,
    /// Current part, while downloading.
    pub part: Option<PartProgress>,
    /// Aggregate transfer progress, while downloading.
    pub overall: Option<TransferProgress>,
}

impl ProgressEvent {
    /// A bare phase change with no byte counts.
    pub fn phase(phase: InstallPhase) -> Self {
        Self {
            phase,
            part: None,
            overall: None,
        }
    }

    /// Name of the part being transferred.
    pub fn part_name(&self) -> Option<&str> {
        self.part.as_ref().map(|p| p.part_name.as_str())
    }

    /// Bytes received for the current part.
    pub fn bytes_received(&self) -> u64 {
        self.part.as_ref().map(|p| p.bytes_received).unwrap_or(0)
    }

    /// Total bytes of the current part, when known.
    pub fn bytes_total(&self) -> Option<u64> {
        self.part.as_ref().and_then(|p| p.bytes_total)
    }

    /// Overall completion in percent, when the total size is known.
    pub fn overall_percent(&self) -> Option<f64> {
        self.overall.as_ref().and_then(TransferProgress::percent)
    }
}

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A human-readable log line produced during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    /// Create an event stamped with the current local time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Receives installer events.
///
/// Both methods default to no-ops so observers implement only what they need.
pub trait InstallObserver: Send + Sync {
    /// Called for every emitted progress update.
    fn on_progress(&self, _event: &ProgressEvent) {}

    /// Called for every log line.
    fn on_log(&self, _event: &LogEvent) {}
}

/// In-memory observer that records everything it sees.
#[derive(Debug, Default)]
pub struct EventLog {
    logs: Mutex<Vec<LogEvent>>,
    progress: Mutex<Vec<ProgressEvent>>,
}

impl EventLog {
    /// Create an empty event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded log events.
    pub fn logs(&self) -> Vec<LogEvent> {
        self.logs.lock().clone()
    }

    /// Snapshot of recorded progress events.
    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.progress.lock().clone()
    }

    /// Log events at the given level.
    pub fn logs_at(&self, level: LogLevel) -> Vec<LogEvent> {
        self.logs
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.logs.lock().clear();
        self.progress.lock().clear();
    }
}

impl InstallObserver for EventLog {
    fn on_progress(&self, event: &ProgressEvent) {
        self.progress.lock().push(event.clone());
    }

    fn on_log(&self, event: &LogEvent) {
        self.logs.lock().push(event.clone());
    }
}

/// An event forwarded through a channel.
#[derive(Debug, Clone)]
pub enum InstallEvent {
    Progress(ProgressEvent),
    Log(LogEvent),
}

/// Observer that forwards events to an unbounded channel.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<InstallEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<InstallEvent>) -> Self {
        Self { tx }
    }
}

impl InstallObserver for ChannelObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self.tx.send(InstallEvent::Progress(event.clone()));
    }

    fn on_log(&self, event: &LogEvent) {
        let _ = self.tx.send(InstallEvent::Log(event.clone()));
    }
}
