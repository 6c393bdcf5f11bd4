//! Fan-out of outbound messages to connected chat streams

use crate::engine::{Transport, TransportError};
use crate::session::ChatId;
use crate::state_machine::Outbound;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

const STREAM_BUFFER: usize = 64;

/// One broadcast channel per chat identity.
///
/// A chat with no open stream is unreachable: sends to it fail and the
/// engine drops the session.
#[derive(Default)]
pub struct ChatHub {
    channels: Mutex<HashMap<ChatId, broadcast::Sender<Outbound>>>,
}

impl ChatHub {
    pub fn subscribe(&self, chat_id: &ChatId) -> broadcast::Receiver<Outbound> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        // Streams that closed without a later send leave their channel behind
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels
            .entry(chat_id.clone())
            .or_insert_with(|| broadcast::channel(STREAM_BUFFER).0)
            .subscribe()
    }

    pub fn is_connected(&self, chat_id: &ChatId) -> bool {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let connected = channels
            .get(chat_id)
            .is_some_and(|tx| tx.receiver_count() > 0);
        if !connected {
            channels.remove(chat_id);
        }
        connected
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Transport for ChatHub {
    async fn send(&self, chat_id: &ChatId, outbound: Outbound) -> Result<(), TransportError> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = channels.get(chat_id) else {
            return Err(TransportError::Unreachable(chat_id.clone()));
        };
        if tx.send(outbound).is_err() {
            // Every stream for this chat has gone away
            channels.remove(chat_id);
            return Err(TransportError::Unreachable(chat_id.clone()));
        }
        Ok(())
    }
}
