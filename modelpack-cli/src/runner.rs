//! Shared command setup: configuration, logging and the async runtime.

use std::future::Future;
use std::sync::Arc;

use modelpack::config::{config_file_path, ConfigFile};
use modelpack::logging::{init_logging, WorkerGuard};
use modelpack::manager::{InstallObserver, Installer, ManagerConfig};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Holds everything a command needs for the duration of one invocation.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load configuration, initialize logging and start the runtime.
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load()?.with_env_overrides();
        let log_guard = init_logging(&config.logging.level, config.logging.file.as_deref())?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    /// Log the command being run.
    pub fn log_startup(&self, command: &str) {
        info!(
            version = modelpack::VERSION,
            command,
            config = %config_file_path().display(),
            "modelpack starting"
        );
    }

    /// Effective configuration (file plus environment overrides).
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Run a future to completion on the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Build an installer reporting to `observer`.
    pub fn create_installer(
        &self,
        config: ManagerConfig,
        observer: Arc<dyn InstallObserver>,
    ) -> Result<Arc<Installer>, CliError> {
        let installer = Installer::new(config)?.with_observer(observer);
        Ok(Arc::new(installer))
    }
}
