//! Chat transport seam
//!
//! The engine only emits [`Outbound`] instructions; rendering them for a
//! concrete chat service is up to the transport.

use crate::session::ChatId;
use crate::state_machine::Outbound;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("chat {0} is not reachable")]
    Unreachable(ChatId),
}

/// Outbound side of a chat service
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, chat_id: &ChatId, outbound: Outbound) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, chat_id: &ChatId, outbound: Outbound) -> Result<(), TransportError> {
        (**self).send(chat_id, outbound).await
    }
}
