//! Asynchronous side-effect delivery.
//!
//! Notifications are queued on a bounded channel and delivered by a single
//! dispatcher task, in enqueue order, with per-notification retry. Anything
//! that cannot be delivered ends up on a bounded dead-letter queue instead of
//! being silently dropped.

use chrono::{DateTime, Utc};
use coherence_graph::{AgentId, Metadata};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::collaborators::{Collaborators, ThresholdEvent};
use crate::config::NotificationConfig;
use crate::error::CollaboratorError;

/// A side effect of an edge addition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Threshold(ThresholdEvent),
    Reflection {
        agent_id: AgentId,
        score: f64,
        context: Metadata,
    },
    Metrics {
        agent_id: AgentId,
        score: f64,
        metadata: Metadata,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Threshold(_) => "threshold",
            Notification::Reflection { .. } => "reflection",
            Notification::Metrics { .. } => "metrics",
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        match self {
            Notification::Threshold(event) => &event.agent_id,
            Notification::Reflection { agent_id, .. } => agent_id,
            Notification::Metrics { agent_id, .. } => agent_id,
        }
    }
}

/// A notification that could not be delivered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeadLetter {
    pub notification: Notification,
    pub attempts: u32,
    pub last_error: String,
    pub dead_lettered_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

enum Command {
    Deliver(Notification),
    Flush(oneshot::Sender<()>),
}

struct DeadLetterQueue {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl DeadLetterQueue {
    fn push(&self, letter: DeadLetter, counters: &Counters) {
        tracing::warn!(
            kind = letter.notification.kind(),
            agent_id = %letter.notification.agent_id(),
            attempts = letter.attempts,
            error = %letter.last_error,
            "Notification dead-lettered"
        );
        counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(letter);
    }
}

pub struct NotificationDispatcher {
    tx: Mutex<Option<mpsc::Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dead_letters: Arc<DeadLetterQueue>,
    counters: Arc<Counters>,
}

impl NotificationDispatcher {
    /// Start the dispatcher task. Must be called within a tokio runtime.
    pub fn spawn(collaborators: Collaborators, config: &NotificationConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let dead_letters = Arc::new(DeadLetterQueue {
            entries: Mutex::new(VecDeque::new()),
            capacity: config.dead_letter_capacity.max(1),
        });
        let counters = Arc::new(Counters::default());

        let delivery = Delivery {
            collaborators,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
            dead_letters: Arc::clone(&dead_letters),
            counters: Arc::clone(&counters),
        };
        let worker = tokio::spawn(delivery.run(rx));

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            dead_letters,
            counters,
        }
    }

    /// Queue a notification without waiting. A full or closed channel
    /// dead-letters it immediately.
    pub fn enqueue(&self, notification: Notification) {
        let sender = self.tx.lock().clone();
        let Some(sender) = sender else {
            self.reject(notification, "dispatcher closed");
            return;
        };
        match sender.try_send(Command::Deliver(notification)) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(Command::Deliver(n))) => {
                self.reject(n, "notification channel full");
            }
            Err(mpsc::error::TrySendError::Closed(Command::Deliver(n))) => {
                self.reject(n, "dispatcher closed");
            }
            Err(_) => {}
        }
    }

    /// Wait until everything enqueued before this call has been delivered or
    /// dead-lettered.
    pub async fn flush(&self) {
        let sender = self.tx.lock().clone();
        let Some(sender) = sender else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if sender.send(Command::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Stop intake, deliver what is queued and wait for the dispatcher to exit.
    pub async fn shutdown(&self) {
        let sender = self.tx.lock().take();
        drop(sender);
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Notification dispatcher task failed");
            }
        }
        tracing::info!("Notification dispatcher stopped");
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.entries.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            dead_lettered: self.counters.dead_lettered.load(Ordering::Relaxed),
        }
    }

    fn reject(&self, notification: Notification, reason: &str) {
        self.dead_letters.push(
            DeadLetter {
                notification,
                attempts: 0,
                last_error: reason.to_string(),
                dead_lettered_at: Utc::now(),
            },
            &self.counters,
        );
    }
}

struct Delivery {
    collaborators: Collaborators,
    max_attempts: u32,
    backoff: Duration,
    dead_letters: Arc<DeadLetterQueue>,
    counters: Arc<Counters>,
}

impl Delivery {
    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        tracing::info!("Notification dispatcher started");
        while let Some(command) = rx.recv().await {
            match command {
                Command::Deliver(notification) => self.deliver(notification).await,
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    }

    async fn deliver(&self, notification: Notification) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&notification).await {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        kind = notification.kind(),
                        agent_id = %notification.agent_id(),
                        attempt,
                        error = %e,
                        "Notification delivery failed, retrying"
                    );
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    self.dead_letters.push(
                        DeadLetter {
                            notification,
                            attempts: attempt,
                            last_error: e.to_string(),
                            dead_lettered_at: Utc::now(),
                        },
                        &self.counters,
                    );
                    return;
                }
            }
        }
    }

    async fn attempt(&self, notification: &Notification) -> Result<(), CollaboratorError> {
        match notification {
            Notification::Threshold(event) => self.collaborators.alerts.notify(event).await,
            Notification::Reflection {
                agent_id,
                score,
                context,
            } => {
                self.collaborators
                    .reflection
                    .trigger_reflection(agent_id, *score, context)
                    .await
            }
            Notification::Metrics {
                agent_id,
                score,
                metadata,
            } => {
                self.collaborators
                    .metrics
                    .record(agent_id, *score, metadata)
                    .await
            }
        }
    }
}
