//! Progress reporting for multi-part downloads.
//!
//! The [`ProgressTracker`] aggregates per-part byte counts into overall
//! progress and throttles what reaches observers. Reported values never go
//! backwards for a part, even when a download restarts from zero.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::state::DownloadState;
use crate::manager::context::RunContext;
use crate::manager::events::{InstallPhase, ProgressEvent};

/// Default minimum interval between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Progress of the part currently being transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartProgress {
    /// Zero-based position in the part list.
    pub part_index: usize,
    pub part_name: String,
    pub bytes_received: u64,
    /// Part size, when known.
    pub bytes_total: Option<u64>,
}

/// Aggregate progress across all parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    pub parts_completed: usize,
    pub parts_total: usize,
    pub overall_bytes_received: u64,
    /// Sum of all part sizes, when every size is known.
    pub overall_bytes_total: Option<u64>,
}

impl TransferProgress {
    /// Completion in percent, when the total is known.
    pub fn percent(&self) -> Option<f64> {
        match self.overall_bytes_total {
            Some(total) if total > 0 => {
                Some((self.overall_bytes_received as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

/// Throttle that also enforces monotonic values.
#[derive(Debug, Clone)]
pub struct ProgressGate {
    interval: Duration,
    last_emit: Option<Instant>,
    high_water: Option<u64>,
}

impl ProgressGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            high_water: None,
        }
    }

    /// Decide whether `bytes` should be reported now.
    ///
    /// Values below the highest reported value are always suppressed.
    /// `force` bypasses the interval but not the monotonic check.
    pub fn admit(&mut self, bytes: u64, force: bool) -> bool {
        if self.high_water.is_some_and(|high| bytes < high) {
            return false;
        }

        let now = Instant::now();
        let due = self
            .last_emit
            .map_or(true, |last| now.duration_since(last) >= self.interval);

        if !force && !due {
            return false;
        }

        self.last_emit = Some(now);
        self.high_water = Some(bytes);
        true
    }

    /// Highest value reported so far.
    pub fn high_water(&self) -> u64 {
        self.high_water.unwrap_or(0)
    }
}

#[derive(Debug)]
struct CurrentPart {
    index: usize,
    name: String,
    total: Option<u64>,
    gate: ProgressGate,
}

/// Aggregates part progress and forwards throttled events to a run context.
#[derive(Debug)]
pub struct ProgressTracker {
    state: DownloadState,
    interval: Duration,
    current: Option<CurrentPart>,
}

impl ProgressTracker {
    pub fn new(state: DownloadState, interval: Duration) -> Self {
        Self {
            state,
            interval,
            current: None,
        }
    }

    /// Start tracking a part.
    pub fn begin_part(&mut self, index: usize, name: &str, total: Option<u64>) {
        self.current = Some(CurrentPart {
            index,
            name: name.to_string(),
            total,
            gate: ProgressGate::new(self.interval),
        });
    }

    /// Update the current part's size once a server reveals it.
    pub fn set_part_total(&mut self, total: Option<u64>) {
        if let Some(current) = self.current.as_mut() {
            if current.total.is_none() {
                current.total = total;
            }
        }
    }

    /// Size of the current part, if known.
    pub fn part_total(&self) -> Option<u64> {
        self.current.as_ref().and_then(|c| c.total)
    }

    /// Report bytes received for the current part.
    pub fn report(&mut self, ctx: &RunContext, bytes_received: u64, force: bool) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if !current.gate.admit(bytes_received, force) {
            return;
        }

        let part = PartProgress {
            part_index: current.index,
            part_name: current.name.clone(),
            bytes_received,
            bytes_total: current.total,
        };
        let event = self.event(Some(part), bytes_received);
        ctx.progress(&event);
    }

    /// Mark the current part staged and emit a final report for it.
    pub fn complete_part(&mut self, ctx: &RunContext, file: PathBuf, size: u64, transferred: u64) {
        self.set_part_total(Some(size));
        self.report(ctx, size, true);
        self.state.record_success(file, size, transferred);
        self.current = None;
    }

    /// Current aggregate state.
    pub fn state(&self) -> &DownloadState {
        &self.state
    }

    /// Consume the tracker, returning the aggregate state.
    pub fn into_state(self) -> DownloadState {
        self.state
    }

    fn event(&self, part: Option<PartProgress>, part_bytes: u64) -> ProgressEvent {
        ProgressEvent {
            phase: InstallPhase::Downloading,
            part,
            overall: Some(TransferProgress {
                parts_completed: self.state.downloaded_parts,
                parts_total: self.state.total_parts,
                overall_bytes_received: self.state.bytes_completed + part_bytes,
                overall_bytes_total: self.state.total_size,
            }),
        }
    }
}
