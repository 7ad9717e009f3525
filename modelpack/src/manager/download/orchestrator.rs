//! Multi-part download orchestrator.
//!
//! Sequences part downloads into a staging directory, skips parts that are
//! already staged, and aggregates progress across the whole package.

use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, info};

use super::checksum::verify_checksum_async;
use super::http::{file_len, PartDownloader};
use super::progress::{ProgressTracker, DEFAULT_PROGRESS_INTERVAL};
use super::state::DownloadState;
use crate::manager::context::RunContext;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::package::AssetPart;

/// Multi-part download orchestrator.
///
/// Parts are downloaded strictly one at a time in the order given. The
/// first part that exhausts its retry budget aborts the run; parts already
/// staged stay on disk for the next run.
#[derive(Debug, Clone)]
pub struct TransferOrchestrator {
    downloader: PartDownloader,
    progress_interval: Duration,
}

impl TransferOrchestrator {
    pub fn new(downloader: PartDownloader) -> Self {
        Self {
            downloader,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Minimum interval between progress events.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn downloader(&self) -> &PartDownloader {
        &self.downloader
    }

    /// Fill in unknown part sizes with `HEAD` requests.
    ///
    /// Failed queries leave the size unknown. Only cancellation is an error.
    pub async fn query_missing_sizes(
        &self,
        parts: &mut [AssetPart],
        ctx: &RunContext,
    ) -> ManagerResult<()> {
        for part in parts.iter_mut().filter(|p| p.known_size().is_none()) {
            ctx.check_cancelled()?;
            match self.downloader.query_size(&part.source_url).await {
                Ok(Some(size)) => {
                    debug!(part = %part.name, size, "size discovered");
                    part.expected_size = size;
                }
                Ok(None) => debug!(part = %part.name, "server did not report a size"),
                Err(e) => debug!(part = %part.name, error = %e, "size query failed"),
            }
        }
        Ok(())
    }

    /// Download every part into `staging_dir`.
    ///
    /// Returns the final download state; its `files` are the staged parts in
    /// order, ready for extraction.
    pub async fn run(
        &self,
        parts: &[AssetPart],
        staging_dir: &Path,
        ctx: &RunContext,
    ) -> ManagerResult<DownloadState> {
        fs::create_dir_all(staging_dir)
            .await
            .map_err(|e| ManagerError::io(staging_dir, e))?;

        let mut tracker =
            ProgressTracker::new(DownloadState::new(parts), self.progress_interval);
        let total = parts.len();

        for (index, part) in parts.iter().enumerate() {
            ctx.check_cancelled()?;

            let dest = staging_dir.join(&part.name);
            tracker.begin_part(index, &part.name, part.known_size());

            if let Some(size) = self.already_staged(part, &dest, ctx).await? {
                ctx.info(format!("{}: already downloaded, skipping", part.name));
                tracker.complete_part(ctx, dest, size, 0);
                continue;
            }

            ctx.info(format!(
                "Downloading {} ({}/{})",
                part.name,
                index + 1,
                total
            ));

            let outcome = self
                .downloader
                .download_part(part, &dest, &mut tracker, ctx)
                .await?;
            tracker.complete_part(ctx, outcome.path, outcome.size, outcome.bytes_transferred);
        }

        let state = tracker.into_state();
        info!(
            parts = state.total_parts,
            bytes = state.bytes_completed,
            transferred = state.bytes_transferred,
            "all parts staged"
        );
        Ok(state)
    }

    /// Size of a complete final file for `part`, if one is on disk.
    ///
    /// A final file with the wrong size or digest is removed.
    async fn already_staged(
        &self,
        part: &AssetPart,
        dest: &Path,
        ctx: &RunContext,
    ) -> ManagerResult<Option<u64>> {
        let size = file_len(dest).await?;
        if size == 0 {
            return Ok(None);
        }

        let size_ok = part.known_size().map_or(true, |expected| expected == size);
        let digest_ok = if !size_ok {
            false
        } else if let Some(digest) = &part.sha256 {
            match verify_checksum_async(dest.to_path_buf(), part.name.clone(), digest.clone())
                .await
            {
                Ok(()) => true,
                Err(ManagerError::ChecksumMismatch { .. }) => false,
                Err(e) => return Err(e),
            }
        } else {
            true
        };

        if size_ok && digest_ok {
            return Ok(Some(size));
        }

        ctx.info(format!(
            "{}: existing file does not match, downloading again",
            part.name
        ));
        remove(dest).await?;
        Ok(None)
    }
}

async fn remove(path: &Path) -> ManagerResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManagerError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::manager::download::policy::RetryPolicy;
    use crate::manager::events::LogLevel;
    use crate::manager::testing::{context, payload, ScriptedSender};
    use crate::manager::transport::{HttpMethod, Transport, DEFAULT_MAX_REDIRECTS};

    const BASE: &str = "https://dl.test/";

    fn orchestrator(sender: &Arc<ScriptedSender>) -> TransferOrchestrator {
        let downloader = PartDownloader::new(
            Transport::new(sender.clone(), DEFAULT_MAX_REDIRECTS),
            RetryPolicy::exponential_with(2, Duration::from_millis(1), Duration::from_millis(2)),
        );
        TransferOrchestrator::new(downloader).with_progress_interval(Duration::ZERO)
    }

    /// Serve parts with the given sizes and return their descriptions.
    fn serve_parts(sender: &ScriptedSender, sizes: &[usize]) -> Vec<(AssetPart, Vec<u8>)> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let name = format!("model-pack.7z.{:03}", i + 1);
                let url = format!("{}{}", BASE, name);
                let data = payload(*size, i as u8);
                sender.serve(&url, data.clone());
                (AssetPart::new(name, url).with_size(*size as u64), data)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_downloads_parts_in_order() {
        let temp = TempDir::new().unwrap();
        let sender = Arc::new(ScriptedSender::new());
        let served = serve_parts(&sender, &[1_000, 2_000, 500]);
        let parts: Vec<AssetPart> = served.iter().map(|(p, _)| p.clone()).collect();
        let (ctx, log) = context();

        let state = orchestrator(&sender)
            .run(&parts, temp.path(), &ctx)
            .await
            .unwrap();

        assert!(state.is_complete());
        assert_eq!(state.bytes_completed, 3_500);
        assert_eq!(state.bytes_transferred, 3_500);

        let urls: Vec<String> = sender.requests().into_iter().map(|r| r.url).collect();
        let expected: Vec<String> = parts.iter().map(|p| p.source_url.clone()).collect();
        assert_eq!(urls, expected);

        for ((part, data), file) in served.iter().zip(state.into_files()) {
            assert_eq!(file, temp.path().join(&part.name));
            assert_eq!(&std::fs::read(&file).unwrap(), data);
        }

        let last = log.progress().last().cloned().unwrap();
        assert_eq!(last.overall_percent(), Some(100.0));
        let overall = last.overall.unwrap();
        assert_eq!(overall.parts_completed, 2);
        assert_eq!(overall.overall_bytes_received, 3_500);
    }

    #[tokio::test]
    async fn test_skips_complete_final_files() {
        let temp = TempDir::new().unwrap();
        let sender = Arc::new(ScriptedSender::new());
        let served = serve_parts(&sender, &[100, 200]);
        std::fs::write(temp.path().join(&served[0].0.name), &served[0].1).unwrap();
        let parts: Vec<AssetPart> = served.iter().map(|(p, _)| p.clone()).collect();
        let (ctx, log) = context();

        let state = orchestrator(&sender)
            .run(&parts, temp.path(), &ctx)
            .await
            .unwrap();

        assert!(sender
            .requests_for(HttpMethod::Get, &parts[0].source_url)
            .is_empty());
        assert_eq!(state.bytes_completed, 300);
        assert_eq!(state.bytes_transferred, 200);
        assert!(log
            .logs()
            .iter()
            .any(|e| e.message.contains("already downloaded")));
    }

    #[tokio::test]
    async fn test_wrong_size_final_file_is_replaced() {
        let temp = TempDir::new().unwrap();
        let sender = Arc::new(ScriptedSender::new());
        let served = serve_parts(&sender, &[100]);
        let dest = temp.path().join(&served[0].0.name);
        std::fs::write(&dest, b"stale").unwrap();
        let parts = vec![served[0].0.clone()];
        let (ctx, _log) = context();

        orchestrator(&sender)
            .run(&parts, temp.path(), &ctx)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), served[0].1);
    }

    #[tokio::test]
    async fn test_failure_aborts_and_keeps_completed_parts() {
        let temp = TempDir::new().unwrap();
        let sender = Arc::new(ScriptedSender::new());
        let served = serve_parts(&sender, &[100, 100, 100]);
        sender.status(&served[1].0.source_url, 500);
        let parts: Vec<AssetPart> = served.iter().map(|(p, _)| p.clone()).collect();
        let (ctx, log) = context();

        let err = orchestrator(&sender)
            .run(&parts, temp.path(), &ctx)
            .await
            .unwrap_err();

        match err {
            ManagerError::DownloadFailed { part, attempts, .. } => {
                assert_eq!(part, parts[1].name);
                assert_eq!(attempts, 2);
            }
            other => panic!("expected DownloadFailed, got {:?}", other),
        }
        assert_eq!(log.logs_at(LogLevel::Warn).len(), 1);
        assert!(temp.path().join(&parts[0].name).exists());
        assert!(sender.requests_for(HttpMethod::Get, &parts[2].source_url).is_empty());
    }

    #[tokio::test]
    async fn test_query_missing_sizes() {
        let sender = Arc::new(ScriptedSender::new());
        let served = serve_parts(&sender, &[1_234]);
        let mut parts = vec![
            AssetPart::new(&served[0].0.name, &served[0].0.source_url),
            AssetPart::new("model-pack.7z.002", format!("{}missing", BASE)),
            AssetPart::new("model-pack.7z.003", format!("{}known", BASE)).with_size(9),
        ];
        let (ctx, _log) = context();

        orchestrator(&sender)
            .query_missing_sizes(&mut parts, &ctx)
            .await
            .unwrap();

        assert_eq!(parts[0].expected_size, 1_234);
        assert_eq!(parts[1].expected_size, 0);
        assert_eq!(parts[2].expected_size, 9);
        // Known sizes are not queried
        assert_eq!(sender.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let sender = Arc::new(ScriptedSender::new());
        let served = serve_parts(&sender, &[10]);
        let parts = vec![served[0].0.clone()];
        let (ctx, _log) = context();
        ctx.cancel_token().cancel();

        let err = orchestrator(&sender)
            .run(&parts, temp.path(), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ManagerError::Cancelled));
        assert!(sender.requests().is_empty());
    }
}
