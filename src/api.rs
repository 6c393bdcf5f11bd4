//! HTTP chat transport
//!
//! Clients post inbound events for a chat identity and read the replies
//! from a per-chat Server-Sent Events stream.

mod handlers;
mod hub;
mod sse;
mod types;

pub use handlers::create_router;
pub use hub::ChatHub;

use crate::engine::FormEngine;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: FormEngine<Arc<ChatHub>>,
    pub hub: Arc<ChatHub>,
}

impl AppState {
    pub fn new(engine: FormEngine<Arc<ChatHub>>) -> Self {
        let hub = Arc::clone(engine.transport());
        Self { engine, hub }
    }
}
