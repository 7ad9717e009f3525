//! Download state for a multi-part transfer.
//!
//! Tracks completed parts, byte counts and the staged files that are handed
//! to the extractor once every part is in place.

use std::path::PathBuf;

use crate::package::AssetPart;

/// Download state for tracking multi-part downloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadState {
    /// Total number of parts.
    pub total_parts: usize,
    /// Number of parts fully staged.
    pub downloaded_parts: usize,
    /// Bytes of fully staged parts, including ones found already on disk.
    pub bytes_completed: u64,
    /// Bytes received over the network during this run.
    pub bytes_transferred: u64,
    /// Sum of all part sizes, when every size is known.
    pub total_size: Option<u64>,
    /// Staged part files in part order.
    pub files: Vec<PathBuf>,
}

impl DownloadState {
    /// Create a new download state for the given parts.
    pub fn new(parts: &[AssetPart]) -> Self {
        let total_size = parts
            .iter()
            .map(AssetPart::known_size)
            .sum::<Option<u64>>();

        Self {
            total_parts: parts.len(),
            total_size,
            ..Default::default()
        }
    }

    /// Check if every part has been staged.
    pub fn is_complete(&self) -> bool {
        self.downloaded_parts == self.total_parts
    }

    /// Get the progress as a percentage.
    ///
    /// Falls back to part-based progress if total size is unknown.
    pub fn progress_percent(&self) -> f64 {
        match self.total_size {
            Some(total) if total > 0 => {
                (self.bytes_completed as f64 / total as f64 * 100.0).min(100.0)
            }
            _ if self.total_parts == 0 => 100.0,
            _ => (self.downloaded_parts as f64 / self.total_parts as f64) * 100.0,
        }
    }

    /// Record a staged part.
    ///
    /// `transferred` is the portion of `size` received during this run.
    pub fn record_success(&mut self, file: PathBuf, size: u64, transferred: u64) {
        self.downloaded_parts += 1;
        self.bytes_completed += size;
        self.bytes_transferred += transferred;
        self.files.push(file);
    }

    /// The staged files, in part order.
    pub fn into_files(self) -> Vec<PathBuf> {
        self.files
    }
}
