//! Bounded transfer queue.
//!
//! Transfers flow through a fixed-capacity channel served by a small worker
//! pool. Submission is a non-blocking offer: a full channel answers
//! `queue_full` immediately instead of applying backpressure to the HTTP
//! task. Every job's oneshot is completed exactly once.

use crate::error::{ApiError, ApiResult};
use crate::models::{Transaction, TransferRequest};
use crate::services::transaction_service::TransactionService;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_BUFFER: usize = 50;

/// One queued transfer plus its response channel.
struct TransferJob {
    from_user: i64,
    request: TransferRequest,
    respond_to: oneshot::Sender<ApiResult<Transaction>>,
}

pub struct TransactionQueue {
    service: Arc<TransactionService>,
    workers: usize,
    buffer: usize,
    /// `None` after `stop()`; dropping the sender closes the intake.
    intake: RwLock<Option<mpsc::Sender<TransferJob>>>,
    receiver: Mutex<Option<mpsc::Receiver<TransferJob>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TransactionQueue {
    pub fn new(workers: usize, service: Arc<TransactionService>, buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        Self {
            service,
            workers,
            buffer,
            intake: RwLock::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool. Workers pull jobs one at a time off the shared
    /// receiver, which preserves global FIFO dequeue order.
    pub async fn start(&self) {
        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .expect("queue already started");
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = self.handles.lock().await;
        for worker_id in 0..self.workers {
            let receiver = receiver.clone();
            let service = self.service.clone();
            handles.push(tokio::spawn(worker_loop(worker_id, receiver, service)));
        }

        tracing::info!(
            workers = self.workers,
            buffer_size = self.buffer,
            "transaction queue started"
        );
    }

    /// Offer a transfer job without blocking.
    ///
    /// Returns a receiver that completes with the committed transaction or
    /// the failure. A full queue fails fast with `queue_full`.
    pub async fn submit(
        &self,
        from_user: i64,
        request: TransferRequest,
    ) -> ApiResult<oneshot::Receiver<ApiResult<Transaction>>> {
        let (respond_to, result) = oneshot::channel();
        let job = TransferJob {
            from_user,
            request,
            respond_to,
        };

        let intake = self.intake.read().await;
        let sender = intake
            .as_ref()
            .ok_or_else(|| ApiError::Unavailable("Transaction queue is stopped".into()))?;

        match sender.try_send(job) {
            Ok(()) => {
                tracing::debug!(from_user, "transfer job enqueued");
                Ok(result)
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(from_user, "transaction queue full, job rejected");
                Err(ApiError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                Err(ApiError::Unavailable("Transaction queue is stopped".into()))
            }
        }
    }

    /// Close the intake and wait for the workers to drain buffered jobs.
    pub async fn stop(&self) {
        {
            let mut intake = self.intake.write().await;
            intake.take();
        }

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "worker join failed during shutdown");
            }
        }

        tracing::info!("transaction queue stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TransferJob>>>,
    service: Arc<TransactionService>,
) {
    tracing::info!(worker_id, "worker started");

    loop {
        // Hold the receiver lock only for the dequeue so workers process
        // jobs concurrently.
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };

        let Some(job) = job else {
            break;
        };

        tracing::debug!(
            worker_id,
            from_user = job.from_user,
            to_user = job.request.to_user_id,
            amount = %job.request.amount,
            "processing transfer"
        );

        let outcome = AssertUnwindSafe(service.transfer(job.from_user, &job.request))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(worker_id, panic = %detail, "worker recovered from panic");
                Err(ApiError::Internal(format!("transfer worker panicked: {detail}")))
            }
        };

        match &result {
            Ok(tx) => tracing::info!(worker_id, transaction_id = tx.id, "transfer completed"),
            Err(err) => tracing::warn!(worker_id, error = %err, "transfer failed"),
        }

        // The submitter may have hung up; that only loses the reply.
        let _ = job.respond_to.send(result);
    }

    tracing::info!(worker_id, "worker stopped");
}
