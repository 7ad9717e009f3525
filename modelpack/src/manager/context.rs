//! Per-run context shared by every installer component.
//!
//! A [`RunContext`] carries the cancellation token, the observer fan-out and
//! the run's log history. Nothing about a run lives in global state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::error::{ManagerError, ManagerResult};
use super::events::{InstallObserver, LogEvent, LogLevel, ProgressEvent};

/// Context for a single install run.
#[derive(Clone)]
pub struct RunContext {
    cancel: CancellationToken,
    observers: Vec<Arc<dyn InstallObserver>>,
    history: Arc<Mutex<Vec<LogEvent>>>,
}

impl RunContext {
    /// Create a context with no observers.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            observers: Vec::new(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an observer.
    pub fn with_observer(mut self, observer: Arc<dyn InstallObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Add several observers.
    pub fn with_observers(
        mut self,
        observers: impl IntoIterator<Item = Arc<dyn InstallObserver>>,
    ) -> Self {
        self.observers.extend(observers);
        self
    }

    /// The run's cancellation token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`ManagerError::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> ManagerResult<()> {
        if self.is_cancelled() {
            Err(ManagerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `delay`, waking early with an error on cancellation.
    pub async fn sleep(&self, delay: Duration) -> ManagerResult<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ManagerError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the run is cancelled first.
    ///
    /// Only wrap futures that are safe to drop mid-way, such as a pending
    /// request or a socket read.
    pub async fn until_cancelled<F: Future>(&self, fut: F) -> ManagerResult<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ManagerError::Cancelled),
            output = fut => Ok(output),
        }
    }

    /// Emit a log event to observers, the history and `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let event = LogEvent::now(level, message);

        match level {
            LogLevel::Info => info!(target: "modelpack::install", "{}", event.message),
            LogLevel::Warn => warn!(target: "modelpack::install", "{}", event.message),
            LogLevel::Error => error!(target: "modelpack::install", "{}", event.message),
        }

        for observer in &self.observers {
            observer.on_log(&event);
        }
        self.history.lock().push(event);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Emit a progress event to observers.
    pub fn progress(&self, event: &ProgressEvent) {
        for observer in &self.observers {
            observer.on_progress(event);
        }
    }

    /// Snapshot of every log event emitted so far.
    pub fn history(&self) -> Vec<LogEvent> {
        self.history.lock().clone()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.is_cancelled())
            .field("observers", &self.observers.len())
            .field("history", &self.history.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::events::{EventLog, InstallPhase};

    #[test]
    fn test_log_reaches_observers_and_history() {
        let log = Arc::new(EventLog::new());
        let ctx = RunContext::new(CancellationToken::new()).with_observer(log.clone());

        ctx.info("hello");
        ctx.warn("careful");
        ctx.progress(&ProgressEvent::phase(InstallPhase::Resolving));

        assert_eq!(log.logs().len(), 2);
        assert_eq!(log.progress().len(), 1);

        let history = ctx.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].level, LogLevel::Warn);
    }

    #[test]
    fn test_clones_share_history() {
        let ctx = RunContext::new(CancellationToken::new());
        let clone = ctx.clone();
        clone.error("from clone");
        assert_eq!(ctx.history().len(), 1);
    }

    #[test]
    fn test_check_cancelled() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(token.clone());
        assert!(ctx.check_cancelled().is_ok());

        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(ManagerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_sleep_completes() {
        let ctx = RunContext::new(CancellationToken::new());
        assert!(ctx.sleep(Duration::from_millis(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_cancel() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let result = ctx.sleep(Duration::from_secs(30)).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(ManagerError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_until_cancelled_passes_output_through() {
        let ctx = RunContext::new(CancellationToken::new());
        let output = ctx.until_cancelled(async { 7 }).await;
        assert_eq!(output.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_until_cancelled_abandons_pending_future() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            ctx.until_cancelled(std::future::pending::<()>()),
        )
        .await
        .expect("pending future should be abandoned on cancel");
        canceller.await.unwrap();

        assert!(matches!(result, Err(ManagerError::Cancelled)));
    }
}
