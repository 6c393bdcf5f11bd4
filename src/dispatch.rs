//! Submission dispatcher
//!
//! A bounded queue drained by a fixed pool of workers. Each worker makes a
//! single delivery attempt per submission and logs the outcome; nothing is
//! retried and nothing flows back into the sessions.

mod notifier;

pub use notifier::{DeliveryError, Notifier, WebhookAuth, WebhookNotifier};

use crate::config::{QueueFullPolicy, WebhookConfig};
use crate::submission::SubmissionEvent;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("dispatch queue is full, dropped submission of '{0}'")]
    Full(String),
    #[error("dispatcher is shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_size: usize,
    pub on_full: QueueFullPolicy,
}

impl From<&WebhookConfig> for DispatcherConfig {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            workers: config.workers_count,
            queue_size: config.queue_size,
            on_full: config.on_full,
        }
    }
}

pub struct SubmissionDispatcher {
    tx: Mutex<Option<mpsc::Sender<SubmissionEvent>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    policy: QueueFullPolicy,
}

impl SubmissionDispatcher {
    /// Spawn the worker pool
    pub fn start(config: DispatcherConfig, notifier: Arc<dyn Notifier>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let rx = Arc::new(AsyncMutex::new(rx));

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let notifier = Arc::clone(&notifier);
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(event) = next else {
                            break;
                        };
                        match notifier.deliver(&event).await {
                            Ok(()) => tracing::info!(
                                worker,
                                form = %event.form_name,
                                "Submission delivered"
                            ),
                            Err(e) => tracing::error!(
                                worker,
                                form = %event.form_name,
                                error = %e,
                                "Submission delivery failed"
                            ),
                        }
                    }
                    tracing::debug!(worker, "Dispatch worker stopped");
                })
            })
            .collect();

        tracing::info!(
            workers = config.workers.max(1),
            queue_size = config.queue_size.max(1),
            policy = ?config.on_full,
            "Submission dispatcher started"
        );

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            policy: config.on_full,
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<SubmissionEvent>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue a submission for delivery.
    ///
    /// With [`QueueFullPolicy::Block`] a full queue makes the caller wait
    /// for room; with [`QueueFullPolicy::Drop`] the event is refused.
    pub async fn enqueue(&self, event: SubmissionEvent) -> Result<(), EnqueueError> {
        let Some(tx) = self.sender() else {
            return Err(EnqueueError::Closed);
        };
        match self.policy {
            QueueFullPolicy::Block => tx.send(event).await.map_err(|_| EnqueueError::Closed),
            QueueFullPolicy::Drop => tx.try_send(event).map_err(|e| match e {
                TrySendError::Full(event) => EnqueueError::Full(event.form_name),
                TrySendError::Closed(_) => EnqueueError::Closed,
            }),
        }
    }

    /// Stop accepting submissions and wait until queued ones are delivered
    pub async fn shutdown(&self) {
        drop(
            self.tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Dispatch worker panicked");
            }
        }
        tracing::info!("Submission dispatcher drained");
    }
}
