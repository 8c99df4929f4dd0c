//! Background analysis worker pool.
//!
//! A bounded FIFO queue drained by a fixed number of workers. Work here is
//! optional post-processing; nothing on the edge-addition path waits for it.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{ProcessorConfig, ShutdownMode};
use crate::error::ProcessorError;

/// Failure reported by a background task.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A unit of background work.
#[async_trait]
pub trait GraphTask: Send + 'static {
    fn name(&self) -> &str;

    async fn run(self: Box<Self>) -> Result<(), TaskError>;
}

/// Adapts an async closure into a [`GraphTask`].
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> GraphTask for FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>) -> Result<(), TaskError> {
        (self.f)().await
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    /// Queued tasks discarded by a `Drop` shutdown.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
}

type TaskQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<Box<dyn GraphTask>>>>;

pub struct AsyncGraphProcessor {
    tx: Mutex<Option<mpsc::Sender<Box<dyn GraphTask>>>>,
    rx: TaskQueue,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
    counters: Arc<Counters>,
    submit_timeout: Duration,
    shutdown_mode: ShutdownMode,
}

impl AsyncGraphProcessor {
    /// Start the worker pool. Must be called within a tokio runtime.
    pub fn start(config: &ProcessorConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Box<dyn GraphTask>>(config.queue_capacity.max(1));
        let rx: TaskQueue = Arc::new(tokio::sync::Mutex::new(rx));
        let (stop, _) = watch::channel(false);
        let counters = Arc::new(Counters::default());

        let workers = (0..config.workers.max(1))
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&rx),
                    stop.subscribe(),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        tracing::info!(
            workers = config.workers.max(1),
            queue_capacity = config.queue_capacity,
            "Graph processor started"
        );

        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            workers: Mutex::new(workers),
            stop,
            counters,
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
            shutdown_mode: config.shutdown,
        }
    }

    /// Enqueue, waiting up to the configured submit timeout for space.
    pub async fn submit(&self, task: Box<dyn GraphTask>) -> Result<(), ProcessorError> {
        self.submit_timeout(task, self.submit_timeout).await
    }

    /// Enqueue, waiting at most `wait` for space.
    pub async fn submit_timeout(
        &self,
        task: Box<dyn GraphTask>,
        wait: Duration,
    ) -> Result<(), ProcessorError> {
        let sender = self.sender()?;
        match tokio::time::timeout(wait, sender.send(task)).await {
            Ok(Ok(())) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Ok(Err(_)) => Err(ProcessorError::Closed),
            Err(_) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(wait_ms = wait.as_millis() as u64, "Task queue full, submit timed out");
                Err(ProcessorError::Timeout(wait))
            }
        }
    }

    /// Enqueue without waiting.
    pub fn try_submit(&self, task: Box<dyn GraphTask>) -> Result<(), ProcessorError> {
        let sender = self.sender()?;
        match sender.try_send(task) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(task)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(task = task.name(), "Task queue full, task rejected");
                Err(ProcessorError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ProcessorError::Closed),
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Shut down using the configured mode.
    pub async fn shutdown(&self) -> ProcessorStats {
        self.shutdown_with(self.shutdown_mode).await
    }

    /// Close intake and wait for every worker to exit.
    ///
    /// `Drain` finishes all queued tasks. `Drop` aborts in-flight tasks and
    /// discards the rest; both count as dropped.
    pub async fn shutdown_with(&self, mode: ShutdownMode) -> ProcessorStats {
        drop(self.tx.lock().take());
        if mode == ShutdownMode::Drop {
            let _ = self.stop.send(true);
        }

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Graph processor worker failed");
            }
        }

        let mut rx = self.rx.lock().await;
        rx.close();
        let mut dropped = 0u64;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            self.counters.dropped.fetch_add(dropped, Ordering::Relaxed);
            tracing::warn!(dropped, "Discarded queued tasks on shutdown");
        }

        let stats = self.stats();
        tracing::info!(
            mode = ?mode,
            completed = stats.completed,
            failed = stats.failed,
            dropped = stats.dropped,
            "Graph processor stopped"
        );
        stats
    }

    fn sender(&self) -> Result<mpsc::Sender<Box<dyn GraphTask>>, ProcessorError> {
        self.tx.lock().clone().ok_or(ProcessorError::Closed)
    }
}

async fn worker_loop(
    id: usize,
    rx: TaskQueue,
    mut stop: watch::Receiver<bool>,
    counters: Arc<Counters>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        let next = tokio::select! {
            biased;
            _ = stop.changed() => None,
            task = async { rx.lock().await.recv().await } => task,
        };
        let Some(task) = next else {
            break;
        };

        let name = task.name().to_string();
        // Own task so a panic surfaces as a JoinError instead of killing the worker.
        let mut handle = tokio::spawn(task.run());
        let abort = handle.abort_handle();
        let outcome = tokio::select! {
            biased;
            outcome = &mut handle => outcome,
            _ = stop.changed() => {
                abort.abort();
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(worker = id, task = %name, "Task cancelled on shutdown");
                break;
            }
        };
        match outcome {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(worker = id, task = %name, "Task completed");
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(worker = id, task = %name, error = %e, "Task failed");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(worker = id, task = %name, error = %e, "Task panicked");
            }
        }
    }
    tracing::debug!(worker = id, "Worker exiting");
}
