//! Mock implementations for testing
//!
//! Recording stand-ins for the transport, notifier and persistence seams.

use super::traits::{Transport, TransportError};
use crate::config::DatabaseConfig;
use crate::dispatch::{DeliveryError, Notifier};
use crate::persistence::{Adaptor, MigrateOutcome, PersistenceError, PersistenceResult};
use crate::session::ChatId;
use crate::state_machine::Outbound;
use crate::submission::SubmissionEvent;
use crate::template::FormTemplate;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

// ============================================================================
// Transport
// ============================================================================

/// Records every outbound message; can be told to fail for some chats
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ChatId, Outbound)>>,
    failing: Mutex<HashSet<ChatId>>,
}

impl RecordingTransport {
    pub fn fail_for(&self, chat_id: &ChatId) {
        self.failing.lock().unwrap().insert(chat_id.clone());
    }

    pub fn sent_to(&self, chat_id: &ChatId) -> Vec<Outbound> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == chat_id)
            .map(|(_, out)| out.clone())
            .collect()
    }

    /// Text or caption of everything sent to a chat
    pub fn bodies(&self, chat_id: &ChatId) -> Vec<String> {
        self.sent_to(chat_id)
            .iter()
            .map(|out| out.body().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat_id: &ChatId, outbound: Outbound) -> Result<(), TransportError> {
        if self.failing.lock().unwrap().contains(chat_id) {
            return Err(TransportError::Unreachable(chat_id.clone()));
        }
        self.sent.lock().unwrap().push((chat_id.clone(), outbound));
        Ok(())
    }
}

// ============================================================================
// Notifiers
// ============================================================================

/// Records deliveries; optionally fails the first few attempts
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<SubmissionEvent>>,
    attempts: AtomicUsize,
    fail_first: usize,
}

impl RecordingNotifier {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<SubmissionEvent> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, event: &SubmissionEvent) -> Result<(), DeliveryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(DeliveryError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Holds every delivery until [`GatedNotifier::open`] is called
pub struct GatedNotifier {
    gate: Semaphore,
    started: watch::Sender<usize>,
    delivered: Mutex<Vec<SubmissionEvent>>,
}

impl Default for GatedNotifier {
    fn default() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: watch::Sender::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }
}

impl GatedNotifier {
    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Wait until at least `n` deliveries have begun
    pub async fn wait_started(&self, n: usize) {
        let mut rx = self.started.subscribe();
        let _ = rx.wait_for(|started| *started >= n).await;
    }

    pub fn delivered(&self) -> Vec<SubmissionEvent> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for GatedNotifier {
    async fn deliver(&self, event: &SubmissionEvent) -> Result<(), DeliveryError> {
        self.started.send_modify(|started| *started += 1);
        let _permit = self.gate.acquire().await;
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// In-memory adaptor named `mock`
#[derive(Default)]
pub struct MockAdaptor {
    open: AtomicBool,
    failing: AtomicBool,
    delay: Option<Duration>,
    inserted: Mutex<Vec<SubmissionEvent>>,
}

impl MockAdaptor {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> Vec<SubmissionEvent> {
        self.inserted.lock().unwrap().clone()
    }
}

impl Adaptor for MockAdaptor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&self, _config: &DatabaseConfig) -> PersistenceResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn migrate(&self, _template: &FormTemplate) -> PersistenceResult<MigrateOutcome> {
        Ok(MigrateOutcome::Created)
    }

    fn insert(&self, _template: &FormTemplate, event: &SubmissionEvent) -> PersistenceResult<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Schema("mock insert failure".into()));
        }
        self.inserted.lock().unwrap().push(event.clone());
        Ok(())
    }
}
