//! HTTP download manager for package archive parts.
//!
//! This module provides functionality for downloading split archive parts,
//! including:
//! - Single part downloads with resume and retry (`http`)
//! - Backoff configuration (`policy`)
//! - SHA-256 checksum verification (`checksum`)
//! - Multi-part download state tracking (`state`)
//! - Throttled, monotonic progress reporting (`progress`)
//! - Sequential orchestration across parts (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! TransferOrchestrator
//!         │
//!         ├── PartDownloader (one part, resume + retry)
//!         │       └── Transport (redirects, ranges)
//!         │
//!         ├── DownloadState (tracks completed parts)
//!         │
//!         └── ProgressTracker (throttled updates to observers)
//! ```

mod checksum;
mod http;
mod orchestrator;
mod policy;
mod progress;
mod state;

pub use checksum::{
    calculate_file_checksum, parse_sha256_digest, verify_checksum, verify_checksum_async,
};
pub use http::{staging_path, PartDownloader, PartOutcome};
pub use orchestrator::TransferOrchestrator;
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS, MAX_ATTEMPTS_LIMIT,
};
pub use progress::{
    PartProgress, ProgressGate, ProgressTracker, TransferProgress, DEFAULT_PROGRESS_INTERVAL,
};
pub use state::DownloadState;
