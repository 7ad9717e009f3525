//! Installer facade.
//!
//! This module orchestrates the full installation workflow:
//! 1. Resolve the package identifier to archive parts
//! 2. Query missing sizes and check free space
//! 3. Download all parts into the staging directory
//! 4. Extract the split archive into the output directory
//! 5. Verify the extracted output
//! 6. Clean up staged parts
//!
//! Only one run may be in flight per [`Installer`]. Progress and log events
//! reach the configured observers; the caller receives one terminal
//! [`InstallResult`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::ManagerConfig;
use super::context::RunContext;
use super::download::{staging_path, PartDownloader, TransferOrchestrator};
use super::error::{ManagerError, ManagerResult};
use super::events::{InstallObserver, InstallPhase, LogEvent, ProgressEvent};
use super::extractor::{ArchiveExtractor, ExternalArchiver, ExtractSummary};
use super::resolver::{auth_headers, AssetResolver};
use super::space::{ensure_free_space, probe_writable};
use super::transport::{HttpSend, ReqwestSend, Transport};
use crate::package::{
    is_part_filename, AssetPart, InstalledPackage, PackageIdentifier, STAGING_SUFFIX,
};

/// Terminal outcome of an install run.
#[derive(Debug)]
pub enum InstallResult {
    /// The package is extracted and verified.
    Installed(InstalledPackage),
    /// The run stopped with an error.
    Failed(ManagerError),
    /// The caller cancelled the run.
    Cancelled,
}

impl InstallResult {
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }

    /// Terminal phase matching this result.
    pub fn phase(&self) -> InstallPhase {
        match self {
            Self::Installed(_) => InstallPhase::Done,
            Self::Failed(_) => InstallPhase::Failed,
            Self::Cancelled => InstallPhase::Cancelled,
        }
    }

    pub fn error(&self) -> Option<&ManagerError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Convert into a `Result`, mapping `Cancelled` to [`ManagerError::Cancelled`].
    pub fn into_result(self) -> ManagerResult<InstalledPackage> {
        match self {
            Self::Installed(package) => Ok(package),
            Self::Failed(e) => Err(e),
            Self::Cancelled => Err(ManagerError::Cancelled),
        }
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Single entry point for installing a package.
pub struct Installer {
    config: ManagerConfig,
    sender: Arc<dyn HttpSend>,
    extractor: Arc<dyn ArchiveExtractor>,
    observers: Vec<Arc<dyn InstallObserver>>,
    running: AtomicBool,
    phase: RwLock<InstallPhase>,
    cancel: Mutex<Option<CancellationToken>>,
    last_history: Mutex<Vec<LogEvent>>,
}

impl Installer {
    /// Create an installer using the network and the external archiver.
    pub fn new(config: ManagerConfig) -> ManagerResult<Self> {
        config.validate()?;

        let sender = ReqwestSend::new(config.timeout, config.connect_timeout, config.read_timeout)?;
        let archiver = match &config.archiver {
            Some(program) => ExternalArchiver::new().with_program(program.clone()),
            None => ExternalArchiver::new(),
        };

        Ok(Self::with_components(
            config,
            Arc::new(sender),
            Arc::new(archiver),
        ))
    }

    /// Create an installer with explicit transport and extractor.
    pub fn with_components(
        config: ManagerConfig,
        sender: Arc<dyn HttpSend>,
        extractor: Arc<dyn ArchiveExtractor>,
    ) -> Self {
        Self {
            config,
            sender,
            extractor,
            observers: Vec::new(),
            running: AtomicBool::new(false),
            phase: RwLock::new(InstallPhase::Idle),
            cancel: Mutex::new(None),
            last_history: Mutex::new(Vec::new()),
        }
    }

    /// Add an observer for every future run.
    pub fn with_observer(mut self, observer: Arc<dyn InstallObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Current phase; the terminal phase of the last run once it has ended.
    pub fn phase(&self) -> InstallPhase {
        *self.phase.read()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Log history of the most recently finished run.
    pub fn last_history(&self) -> Vec<LogEvent> {
        self.last_history.lock().clone()
    }

    /// Request cancellation of the current run.
    ///
    /// Returns `false` when no run is in flight.
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Download, extract and verify the package named by `id`.
    pub async fn install(&self, id: &PackageIdentifier, output_dir: &Path) -> InstallResult {
        let _guard = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return InstallResult::Failed(e),
        };

        let ctx = self.start_run();
        info!(package = %id, output = %output_dir.display(), "install started");
        let result = self.run_install(id, output_dir, &ctx).await;
        self.finish(&ctx, result)
    }

    /// Extract already downloaded parts, skipping discovery and download.
    pub async fn install_from_local(&self, first_part: &Path, output_dir: &Path) -> InstallResult {
        let _guard = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return InstallResult::Failed(e),
        };

        let ctx = self.start_run();
        info!(
            archive = %first_part.display(),
            output = %output_dir.display(),
            "local install started"
        );
        let result = self.run_local(first_part, output_dir, &ctx).await;
        self.finish(&ctx, result)
    }

    fn begin(&self) -> ManagerResult<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ManagerError::AlreadyRunning)?;
        Ok(RunGuard {
            running: &self.running,
        })
    }

    fn start_run(&self) -> RunContext {
        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());
        *self.phase.write() = InstallPhase::Idle;
        RunContext::new(token).with_observers(self.observers.iter().cloned())
    }

    fn set_phase(&self, ctx: &RunContext, phase: InstallPhase) {
        debug!(phase = %phase, "phase change");
        *self.phase.write() = phase;
        ctx.progress(&ProgressEvent::phase(phase));
    }

    fn finish(&self, ctx: &RunContext, result: ManagerResult<InstalledPackage>) -> InstallResult {
        let outcome = match result {
            Ok(package) => {
                ctx.info(format!("Installed to {}", package.path().display()));
                InstallResult::Installed(package)
            }
            Err(ManagerError::Cancelled) => {
                ctx.warn(format!(
                    "Installation cancelled; staged parts kept in {}",
                    self.config.staging_dir.display()
                ));
                InstallResult::Cancelled
            }
            Err(e) => {
                ctx.error(format!("Installation failed: {}", e));
                InstallResult::Failed(e)
            }
        };

        self.set_phase(ctx, outcome.phase());
        *self.cancel.lock() = None;
        *self.last_history.lock() = ctx.history();
        outcome
    }

    async fn run_install(
        &self,
        id: &PackageIdentifier,
        output_dir: &Path,
        ctx: &RunContext,
    ) -> ManagerResult<InstalledPackage> {
        self.config.validate()?;
        let staging = self.config.staging_dir.clone();
        probe_writable(output_dir).await?;
        probe_writable(&staging).await?;

        self.set_phase(ctx, InstallPhase::Resolving);
        let transport = Transport::new(self.sender.clone(), self.config.max_redirects);
        let resolver = AssetResolver::new(transport.clone())
            .with_api_base(self.config.api_base.clone())
            .with_download_base(self.config.download_base.clone())
            .with_max_probe_parts(self.config.max_probe_parts);
        let mut parts = resolver.resolve(id, ctx).await?;

        let downloader = PartDownloader::new(transport, self.config.retry.clone())
            .with_headers(auth_headers(id));
        let orchestrator = TransferOrchestrator::new(downloader)
            .with_progress_interval(self.config.progress_interval);
        orchestrator.query_missing_sizes(&mut parts, ctx).await?;

        if self.config.check_free_space {
            self.check_space(&parts, &staging).await?;
        }

        self.set_phase(ctx, InstallPhase::Downloading);
        let state = orchestrator.run(&parts, &staging, ctx).await?;
        ctx.info(format!(
            "Downloaded {} part(s), {} bytes",
            state.downloaded_parts, state.bytes_completed
        ));

        let first = state
            .files
            .first()
            .cloned()
            .ok_or_else(|| ManagerError::NotFound {
                identifier: id.to_string(),
            })?;

        let summary = self
            .extract_and_verify(&first, output_dir, Some(&staging), ctx)
            .await?;

        remove_staged_parts(&staging, &id.asset_prefix, ctx).await;

        Ok(InstalledPackage::new(Some(id.clone()), output_dir)
            .with_parts(parts.into_iter().map(|p| p.name).collect())
            .with_bytes_downloaded(state.bytes_transferred)
            .with_files_extracted(summary.files_extracted))
    }

    async fn run_local(
        &self,
        first_part: &Path,
        output_dir: &Path,
        ctx: &RunContext,
    ) -> ManagerResult<InstalledPackage> {
        self.config.validate()?;
        probe_writable(output_dir).await?;

        if !first_part.is_file() {
            return Err(ManagerError::io(
                first_part,
                std::io::Error::new(std::io::ErrorKind::NotFound, "archive part not found"),
            ));
        }

        ctx.info(format!("Using local archive {}", first_part.display()));
        let summary = self
            .extract_and_verify(first_part, output_dir, None, ctx)
            .await?;

        let name = first_part
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(InstalledPackage::new(None, output_dir)
            .with_parts(vec![name])
            .with_files_extracted(summary.files_extracted))
    }

    /// Extraction itself is not interruptible; cancellation is honoured
    /// only before it starts.
    async fn extract_and_verify(
        &self,
        first_part: &Path,
        output_dir: &Path,
        keep: Option<&Path>,
        ctx: &RunContext,
    ) -> ManagerResult<ExtractSummary> {
        ctx.check_cancelled()?;
        self.set_phase(ctx, InstallPhase::Extracting);

        if self.config.clean_output_dir {
            ctx.info(format!("Clearing {}", output_dir.display()));
            clear_directory(output_dir, keep).await?;
        }

        ctx.info(format!(
            "Extracting {} into {}",
            first_part.display(),
            output_dir.display()
        ));
        let summary = self.extractor.extract(first_part, output_dir).await?;
        ctx.info(format!("Extracted {} file(s)", summary.files_extracted));

        self.set_phase(ctx, InstallPhase::Verifying);
        self.verify_output(output_dir).await?;
        Ok(summary)
    }

    async fn verify_output(&self, output_dir: &Path) -> ManagerResult<()> {
        let mut entries = tokio::fs::read_dir(output_dir)
            .await
            .map_err(|e| ManagerError::io(output_dir, e))?;
        let first = entries
            .next_entry()
            .await
            .map_err(|e| ManagerError::io(output_dir, e))?;
        if first.is_none() {
            return Err(ManagerError::IncompleteInstall {
                path: output_dir.to_path_buf(),
                reason: "output directory is empty".to_string(),
            });
        }

        if let Some(marker) = &self.config.marker {
            let marker_path = output_dir.join(marker);
            let present = tokio::fs::try_exists(&marker_path)
                .await
                .map_err(|e| ManagerError::io(&marker_path, e))?;
            if !present {
                return Err(ManagerError::IncompleteInstall {
                    path: output_dir.to_path_buf(),
                    reason: format!("expected {} is missing", marker.display()),
                });
            }
        }
        Ok(())
    }

    /// Require room for the bytes still to be downloaded.
    async fn check_space(&self, parts: &[AssetPart], staging: &Path) -> ManagerResult<()> {
        let mut remaining = 0u64;
        for part in parts {
            let Some(expected) = part.known_size() else {
                debug!(part = %part.name, "size unknown, skipping free space check");
                return Ok(());
            };
            let dest = staging.join(&part.name);
            let have = existing_len(&dest)
                .await
                .max(existing_len(&staging_path(&dest)).await);
            remaining += expected.saturating_sub(have);
        }
        ensure_free_space(staging, remaining, self.config.space_headroom)
    }
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn existing_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .unwrap_or(0)
}

/// Remove everything in `dir` except `keep` and its ancestors.
async fn clear_directory(dir: &Path, keep: Option<&Path>) -> ManagerResult<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ManagerError::io(dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ManagerError::io(dir, e))?
    {
        let path = entry.path();
        if keep.is_some_and(|keep| keep.starts_with(&path)) {
            continue;
        }

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ManagerError::io(&path, e))?;
        let removed = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| ManagerError::io(&path, e))?;
    }
    Ok(())
}

/// Best-effort removal of staged part files, then the directory if empty.
async fn remove_staged_parts(staging: &Path, prefix: &str, ctx: &RunContext) {
    let Ok(mut entries) = tokio::fs::read_dir(staging).await else {
        return;
    };

    let mut staged: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        let base = name.strip_suffix(STAGING_SUFFIX).unwrap_or(&name);
        if is_part_filename(prefix, base) {
            staged.push(entry.path());
        }
    }

    let mut removed = 0;
    for path in staged {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => debug!(path = %path.display(), error = %e, "could not remove staged part"),
        }
    }

    if tokio::fs::remove_dir(staging).await.is_ok() {
        debug!(path = %staging.display(), "removed empty staging directory");
    }
    ctx.info(format!("Removed {} staged file(s)", removed));
}
