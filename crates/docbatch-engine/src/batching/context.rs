//! Execution context: deadline and cancellation for backend calls.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use super::types::FetchError;

/// Bounds a batch execution in time and lets another task cancel it.
///
/// Cancellation applies to a whole group at once; there is no per-request
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    timeout: Option<Duration>,
    cancelled: Option<watch::Receiver<bool>>,
}

/// Cancels every execution using the paired `ExecContext`.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl ExecContext {
    /// No deadline, not cancellable.
    pub fn background() -> Self {
        Self::default()
    }

    /// Fails backend calls that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Makes the context cancellable.
    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        self.cancelled = Some(receiver);
        (self, CancelHandle { sender })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Runs `fut` unless the context is cancelled or times out first.
    pub(crate) async fn run<F: Future>(&self, fut: F) -> Result<F::Output, FetchError> {
        let duration_ms = self
            .timeout
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();

        tokio::select! {
            biased;
            _ = wait_cancelled(self.cancelled.clone()) => Err(FetchError::Cancelled),
            _ = sleep_for(self.timeout) => Err(FetchError::Timeout { duration_ms }),
            output = fut => Ok(output),
        }
    }
}

async fn wait_cancelled(receiver: Option<watch::Receiver<bool>>) {
    if let Some(mut receiver) = receiver {
        // A dropped handle without cancel() means never cancelled.
        if receiver.wait_for(|cancelled| *cancelled).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

async fn sleep_for(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}
