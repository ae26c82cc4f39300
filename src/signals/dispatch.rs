//! Bounded-parallelism dispatch pool.
//!
//! ```text
//!   publish() ──enqueue──▶ [ job queue ] ──▶ worker 0 ─┐
//!                          (bounded or   ──▶ worker 1  ├─▶ Subscriber::invoke
//!                           unbounded)   ──▶ worker N ─┘
//! ```
//!
//! Jobs are picked up in enqueue order but complete in any order once more
//! than one worker is running.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::HandlerResult;

/// One "invoke this listener with this signal" unit of work.
pub(crate) struct DispatchJob {
    event: &'static str,
    future: BoxFuture<'static, HandlerResult>,
}

impl DispatchJob {
    pub(crate) fn new(event: &'static str, future: BoxFuture<'static, HandlerResult>) -> Self {
        Self { event, future }
    }

    /// Run the listener, containing both errors and panics.
    async fn execute(self) {
        let event = self.event;
        match AssertUnwindSafe(self.future).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(event, error = %e, "Signal listener failed");
                crate::metrics::record_signal_failure(event, e.error_code());
            }
            Err(_) => {
                error!(event, "Signal listener panicked");
                crate::metrics::record_signal_failure(event, "panic");
            }
        }
    }
}

#[derive(Clone)]
enum JobSender {
    Bounded(mpsc::Sender<DispatchJob>),
    Unbounded(mpsc::UnboundedSender<DispatchJob>),
}

impl JobSender {
    /// Returns `false` once the pool has stopped accepting work.
    async fn send(&self, job: DispatchJob) -> bool {
        match self {
            Self::Bounded(tx) => tx.send(job).await.is_ok(),
            Self::Unbounded(tx) => tx.send(job).is_ok(),
        }
    }
}

enum JobReceiver {
    Bounded(mpsc::Receiver<DispatchJob>),
    Unbounded(mpsc::UnboundedReceiver<DispatchJob>),
}

impl JobReceiver {
    async fn recv(&mut self) -> Option<DispatchJob> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Fixed set of worker tasks draining a shared job queue.
pub(crate) struct DispatchPool {
    sender: RwLock<Option<JobSender>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl DispatchPool {
    /// Spawn `dispatch_tasks` workers. Must be called inside a Tokio runtime.
    pub(crate) fn new(dispatch_tasks: usize, queue_capacity: Option<usize>) -> Self {
        let (sender, receiver) = match queue_capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (JobSender::Bounded(tx), JobReceiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (JobSender::Unbounded(tx), JobReceiver::Unbounded(rx))
            }
        };

        let queue = Arc::new(AsyncMutex::new(receiver));
        let cancel = CancellationToken::new();
        let workers = (0..dispatch_tasks.max(1))
            .map(|worker| tokio::spawn(run_worker(worker, Arc::clone(&queue), cancel.clone())))
            .collect();

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            cancel,
        }
    }

    /// Queue a job. Suspends while a bounded queue is full.
    pub(crate) async fn enqueue(&self, job: DispatchJob) -> bool {
        let sender = self.sender.read().clone();
        match sender {
            Some(tx) => tx.send(job).await,
            None => false,
        }
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Stop accepting jobs and wait until every queued job has run.
    pub(crate) async fn wait_for_completion(&self) {
        self.sender.write().take();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Dispatch worker ended abnormally");
            }
        }
    }

    /// Drop pending jobs and interrupt running ones at their next await point.
    pub(crate) fn shutdown(&self) {
        self.sender.write().take();
        self.cancel.cancel();
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(worker: usize, queue: Arc<AsyncMutex<JobReceiver>>, cancel: CancellationToken) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = async { queue.lock().await.recv().await } => job,
        };
        let Some(job) = next else { break };

        let event = job.event;
        trace!(worker, event, "Dispatching signal");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(worker, event, "Dispatch job cancelled");
                break;
            }
            _ = job.execute() => {}
        }
    }
    trace!(worker, "Dispatch worker stopped");
}
