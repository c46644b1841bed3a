//! Intake and flush policy: turns individual `get` calls into batches.

use std::sync::Arc;
use std::time::Duration;

use docbatch_backend::{BackendResult, HttpMultiGetClient, MultiGetClient};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::batch::Batch;
use super::context::ExecContext;
use super::types::{Destination, GetRequest, ReqResp, ResultReceiver};
use crate::config::{BatchingSettings, DocbatchConfig};

enum Command {
    Get(ReqResp),
    Flush,
    Shutdown(oneshot::Sender<()>),
}

/// Accepts point-gets from any number of tasks and executes them in batches.
///
/// A single intake task owns the open batch. It is flushed when it holds
/// `max_batch_size` requests, when `flush_interval` has passed since its
/// first request, or on `flush()`. Each flushed batch executes on its own
/// task.
#[derive(Debug, Clone)]
pub struct BatchingGetter {
    sender: mpsc::Sender<Command>,
}

impl BatchingGetter {
    /// Starts the intake task. Must be called from within a Tokio runtime.
    pub fn new(
        client: Arc<dyn MultiGetClient>,
        settings: &BatchingSettings,
        request_timeout: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let intake = Intake {
            client,
            settings: settings.clone(),
            request_timeout,
            receiver,
            inflight: JoinSet::new(),
        };
        tokio::spawn(intake.run());
        Self { sender }
    }

    /// Builds an HTTP backend client from configuration and starts a getter
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &DocbatchConfig) -> BackendResult<Self> {
        let client = HttpMultiGetClient::new(&config.backend.to_client_config())?;
        Ok(Self::new(
            Arc::new(client),
            &config.batching,
            config.backend.request_timeout(),
        ))
    }

    /// Submits a point-get. The document is decoded into `destination` if
    /// found; the returned receiver yields exactly one response.
    pub async fn get(&self, request: GetRequest, destination: impl Destination) -> ResultReceiver {
        let (rr, receiver) = ReqResp::new(request, destination);
        if self.sender.send(Command::Get(rr)).await.is_err() {
            // The request was dropped with the command; the receiver reports it.
            warn!("batching getter is shut down, request abandoned");
        }
        receiver
    }

    /// Flushes the open batch now.
    pub async fn flush(&self) {
        let _ = self.sender.send(Command::Flush).await;
    }

    /// Flushes the open batch, waits for every in-flight batch and stops the
    /// intake task.
    pub async fn shutdown(self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Shutdown(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

struct Intake {
    client: Arc<dyn MultiGetClient>,
    settings: BatchingSettings,
    request_timeout: Duration,
    receiver: mpsc::Receiver<Command>,
    inflight: JoinSet<()>,
}

impl Intake {
    async fn run(mut self) {
        let mut batch = self.empty_batch();
        let mut flush_at: Option<Instant> = None;

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(Command::Get(rr)) => {
                        if batch.is_empty() {
                            flush_at = Some(Instant::now() + self.settings.flush_interval());
                        }
                        batch.add(rr);
                        if batch.pending_requests() >= self.settings.max_batch_size {
                            self.flush(&mut batch);
                            flush_at = None;
                        }
                    }
                    Some(Command::Flush) => {
                        self.flush(&mut batch);
                        flush_at = None;
                    }
                    Some(Command::Shutdown(done)) => {
                        self.drain(&mut batch).await;
                        let _ = done.send(());
                        return;
                    }
                    None => {
                        self.drain(&mut batch).await;
                        return;
                    }
                },
                _ = wait_until(flush_at) => {
                    self.flush(&mut batch);
                    flush_at = None;
                }
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "batch task did not complete");
                    }
                }
            }
        }
    }

    fn empty_batch(&self) -> Batch {
        Batch::new(self.settings.execution_mode, self.settings.decode_failure)
    }

    fn flush(&mut self, batch: &mut Batch) {
        if batch.is_empty() {
            return;
        }
        let mut full = std::mem::replace(batch, self.empty_batch());
        let client = Arc::clone(&self.client);
        let ctx = ExecContext::background().with_timeout(self.request_timeout);

        debug!(
            groups = full.len(),
            requests = full.pending_requests(),
            "flushing batch"
        );
        self.inflight.spawn(async move {
            if let Err(e) = full.execute(&ctx, client.as_ref()).await {
                warn!(error = %e, "batch execution failed");
            }
        });
    }

    async fn drain(&mut self, batch: &mut Batch) {
        self.flush(batch);
        while let Some(joined) = self.inflight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "batch task did not complete");
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
