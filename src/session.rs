//! Session store
//!
//! One slot per chat identity. Each slot is guarded by its own async mutex,
//! so events for one chat are applied one at a time while different chats
//! proceed in parallel. Inactivity deadlines are cancellable timer tasks;
//! a fired timer only reports an [`Expiry`] tagged with the epoch it was
//! armed under, and the engine ignores expiries whose epoch is stale.

use crate::state_machine::Progress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// Opaque per-user chat identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Timer report sent when a deadline passes without being reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub chat_id: ChatId,
    pub epoch: u64,
}

#[derive(Debug)]
struct Deadline {
    epoch: u64,
    cancel: CancellationToken,
}

/// Live state of one chat
#[derive(Debug)]
pub struct Session {
    chat_id: ChatId,
    progress: Progress,
    deadline: Option<Deadline>,
    /// Set once the session is cleared; waiters holding the old slot retry
    closed: bool,
}

impl Session {
    fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            progress: Progress::default(),
            deadline: None,
            closed: false,
        }
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = progress;
    }

    /// Epoch of the armed deadline, if any
    pub fn deadline_epoch(&self) -> Option<u64> {
        self.deadline.as_ref().map(|d| d.epoch)
    }
}

/// Exclusive access to one chat's session
pub type SessionGuard = OwnedMutexGuard<Session>;

type Slot = Arc<AsyncMutex<Session>>;

pub struct SessionStore {
    slots: Mutex<HashMap<ChatId, Slot>>,
    next_epoch: AtomicU64,
    expiry_tx: mpsc::Sender<Expiry>,
}

impl SessionStore {
    /// Create a store and the receiver on which expired deadlines arrive
    pub fn new(expiry_capacity: usize) -> (Self, mpsc::Receiver<Expiry>) {
        let (expiry_tx, expiry_rx) = mpsc::channel(expiry_capacity.max(1));
        let store = Self {
            slots: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(1),
            expiry_tx,
        };
        (store, expiry_rx)
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the session of `chat_id`, creating it if needed.
    ///
    /// Waits while another event for the same chat is being processed. If
    /// the session was cleared in the meantime, a fresh one is created.
    pub async fn get_or_create(&self, chat_id: &ChatId) -> SessionGuard {
        loop {
            let slot = Arc::clone(
                self.slots()
                    .entry(chat_id.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(chat_id.clone())))),
            );
            let guard = slot.lock_owned().await;
            if !guard.closed {
                return guard;
            }
            tracing::debug!(chat_id = %chat_id, "Session cleared while waiting, recreating");
        }
    }

    /// Lock the session of `chat_id` only if one is live
    pub async fn get_existing(&self, chat_id: &ChatId) -> Option<SessionGuard> {
        let slot = self.slots().get(chat_id).map(Arc::clone)?;
        let guard = slot.lock_owned().await;
        (!guard.closed).then_some(guard)
    }

    /// Cancel any pending deadline and arm a new one
    pub fn reset_deadline(&self, session: &mut Session, timeout: Duration) {
        if let Some(old) = session.deadline.take() {
            old.cancel.cancel();
        }

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.expiry_tx.clone();
        let chat_id = session.chat_id.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(timeout) => {
                    let _ = tx.send(Expiry { chat_id, epoch }).await;
                }
            }
        });

        session.deadline = Some(Deadline { epoch, cancel });
    }

    /// Close a locked session: cancel its deadline and drop its slot
    pub fn clear_locked(&self, guard: &mut SessionGuard) {
        guard.closed = true;
        if let Some(deadline) = guard.deadline.take() {
            deadline.cancel.cancel();
        }

        let slot = OwnedMutexGuard::mutex(guard);
        let mut slots = self.slots();
        // Only remove the slot this guard belongs to; a newer one may exist
        if slots
            .get(&guard.chat_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(&guard.chat_id);
        }
    }

    /// Clear the session of `chat_id`. Idempotent.
    pub async fn clear(&self, chat_id: &ChatId) {
        if let Some(mut guard) = self.get_existing(chat_id).await {
            self.clear_locked(&mut guard);
        }
    }

    pub fn contains(&self, chat_id: &ChatId) -> bool {
        self.slots().contains_key(chat_id)
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }
}
