//! Resumable single-part downloader.
//!
//! This module provides the core download functionality including:
//! - Resuming from a `.partial` staging file via HTTP Range requests
//! - Retrying transient failures with exponential backoff
//! - Size and SHA-256 verification before the staging file is promoted

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::checksum::verify_checksum_async;
use super::policy::RetryPolicy;
use super::progress::ProgressTracker;
use crate::manager::context::RunContext;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::transport::{BodyStream, HttpRequest, Transport};
use crate::package::{staging_filename, AssetPart};

/// Buffer size for writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Result of a successful part download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartOutcome {
    /// Final (verified) location of the part.
    pub path: PathBuf,
    /// Verified size in bytes.
    pub size: u64,
    /// Bytes received over the network across all attempts.
    pub bytes_transferred: u64,
    /// Number of attempts used.
    pub attempts: u32,
}

/// Downloads one archive part with resume and retry.
#[derive(Debug, Clone)]
pub struct PartDownloader {
    transport: Transport,
    policy: RetryPolicy,
    headers: Vec<(String, String)>,
}

impl PartDownloader {
    pub fn new(transport: Transport, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            headers: Vec::new(),
        }
    }

    /// Headers sent with every request.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Ask the server for the size of `url` without downloading it.
    pub async fn query_size(&self, url: &str) -> ManagerResult<Option<u64>> {
        self.transport.content_length(url, &self.headers).await
    }

    /// Download `part` so that it ends up verified at `dest`.
    ///
    /// Bytes are written to `dest` plus [`crate::package::STAGING_SUFFIX`]
    /// and renamed once verified. Calling this again after a failure
    /// resumes from the staged bytes.
    pub async fn download_part(
        &self,
        part: &AssetPart,
        dest: &Path,
        tracker: &mut ProgressTracker,
        ctx: &RunContext,
    ) -> ManagerResult<PartOutcome> {
        let staging = staging_path(dest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ManagerError::io(parent, e))?;
        }

        let max_attempts = self.policy.max_attempts();
        let mut transferred = 0u64;
        let mut attempt = 1;

        loop {
            ctx.check_cancelled()?;

            let error = match self
                .attempt(part, &staging, tracker, ctx, &mut transferred)
                .await
            {
                Ok(size) => {
                    fs::rename(&staging, dest)
                        .await
                        .map_err(|e| ManagerError::io(dest, e))?;
                    debug!(part = %part.name, size, attempts = attempt, "part staged");
                    return Ok(PartOutcome {
                        path: dest.to_path_buf(),
                        size,
                        bytes_transferred: transferred,
                        attempts: attempt,
                    });
                }
                Err(ManagerError::Cancelled) => return Err(ManagerError::Cancelled),
                Err(e) => e,
            };

            let delay = if error.is_retryable() {
                self.policy.delay_for_attempt(attempt)
            } else {
                None
            };

            match delay {
                Some(delay) => {
                    ctx.warn(format!(
                        "{}: attempt {}/{} failed: {}; retrying in {:.1}s",
                        part.name,
                        attempt,
                        max_attempts,
                        error,
                        delay.as_secs_f64()
                    ));
                    ctx.sleep(delay).await?;
                    attempt += 1;
                }
                None => {
                    return Err(ManagerError::DownloadFailed {
                        part: part.name.clone(),
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            }
        }
    }

    /// One attempt: resume, stream, verify. Returns the verified size.
    async fn attempt(
        &self,
        part: &AssetPart,
        staging: &Path,
        tracker: &mut ProgressTracker,
        ctx: &RunContext,
        transferred: &mut u64,
    ) -> ManagerResult<u64> {
        let mut offset = file_len(staging).await?;

        if let Some(expected) = part.known_size() {
            if offset > expected {
                ctx.info(format!(
                    "{}: staged file is larger than expected ({} > {}), restarting",
                    part.name, offset, expected
                ));
                truncate(staging).await?;
                offset = 0;
            }
            if offset == expected {
                debug!(part = %part.name, "staged file already complete");
                return self.verify(part, staging, None, tracker, ctx).await;
            }
        }

        ctx.check_cancelled()?;

        let mut request = HttpRequest::get(&part.source_url).with_headers(&self.headers);
        if offset > 0 {
            debug!(part = %part.name, offset, "resuming");
            request = request.with_range_from(offset);
        }

        let response = ctx.until_cancelled(self.transport.fetch(request)).await??;

        let (start, advertised) = match response.status {
            416 => {
                if offset == 0 {
                    return Err(ManagerError::status(&response.final_url, 416));
                }
                // Nothing left to send for this offset
                let advertised = response.content_range().and_then(|r| r.total);
                tracker.set_part_total(advertised);
                return self.verify(part, staging, advertised, tracker, ctx).await;
            }
            206 => {
                let range = response.content_range();
                let range_start = range.and_then(|r| r.start);
                if range_start != Some(offset) {
                    truncate(staging).await?;
                    return Err(ManagerError::Transport {
                        url: response.final_url,
                        status: Some(206),
                        reason: format!(
                            "content range starts at {}, expected {}",
                            range_start.map_or_else(|| "?".to_string(), |s| s.to_string()),
                            offset
                        ),
                    });
                }
                let advertised = range
                    .and_then(|r| r.total)
                    .or_else(|| response.content_length().map(|len| offset + len));
                (offset, advertised)
            }
            _ => {
                if offset > 0 {
                    ctx.info(format!(
                        "{}: server ignored the range request, restarting from zero",
                        part.name
                    ));
                }
                (0, response.content_length())
            }
        };

        tracker.set_part_total(advertised);

        let file = open_for_write(staging, start).await?;
        self.stream_body(response.body, file, staging, start, tracker, ctx, transferred)
            .await?;

        self.verify(part, staging, advertised, tracker, ctx).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream_body(
        &self,
        mut body: BodyStream,
        file: File,
        staging: &Path,
        start: u64,
        tracker: &mut ProgressTracker,
        ctx: &RunContext,
        transferred: &mut u64,
    ) -> ManagerResult<u64> {
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
        let mut written = 0u64;

        let streamed = async {
            while let Some(chunk) = ctx.until_cancelled(body.next()).await? {
                let chunk = chunk?;
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| ManagerError::io(staging, e))?;

                written += chunk.len() as u64;
                *transferred += chunk.len() as u64;
                tracker.report(ctx, start + written, false);

                ctx.check_cancelled()?;
            }
            Ok(())
        }
        .await;

        // Received bytes are kept even on failure so the next attempt resumes.
        let flushed = writer
            .flush()
            .await
            .map_err(|e| ManagerError::io(staging, e));

        streamed?;
        flushed?;
        Ok(written)
    }

    /// Check size and digest of the staged file.
    ///
    /// Oversized files and digest mismatches are truncated so the next
    /// attempt starts clean; short files are kept for resuming.
    async fn verify(
        &self,
        part: &AssetPart,
        staging: &Path,
        advertised: Option<u64>,
        tracker: &mut ProgressTracker,
        ctx: &RunContext,
    ) -> ManagerResult<u64> {
        let actual = file_len(staging).await?;

        if let Some(expected) = part.known_size().or(advertised) {
            if actual != expected {
                if actual > expected {
                    truncate(staging).await?;
                }
                return Err(ManagerError::SizeMismatch {
                    part: part.name.clone(),
                    expected,
                    actual,
                });
            }
        }

        if let Some(digest) = &part.sha256 {
            let result =
                verify_checksum_async(staging.to_path_buf(), part.name.clone(), digest.clone())
                    .await;
            if let Err(e) = result {
                if matches!(e, ManagerError::ChecksumMismatch { .. }) {
                    truncate(staging).await?;
                }
                return Err(e);
            }
        }

        tracker.report(ctx, actual, true);
        Ok(actual)
    }
}

/// Staging path for a part destination.
pub fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(staging_filename(&name))
}

/// Length of a file, or 0 when it does not exist.
pub(crate) async fn file_len(path: &Path) -> ManagerResult<u64> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(ManagerError::io(path, e)),
    }
}

async fn truncate(path: &Path) -> ManagerResult<()> {
    File::create(path)
        .await
        .map(|_| ())
        .map_err(|e| ManagerError::io(path, e))
}

async fn open_for_write(path: &Path, start: u64) -> ManagerResult<File> {
    let result = if start == 0 {
        File::create(path).await
    } else {
        OpenOptions::new().append(true).open(path).await
    };
    result.map_err(|e| ManagerError::io(path, e))
}
