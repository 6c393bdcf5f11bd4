//! Server-Sent Events support

use crate::state_machine::Outbound;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a chat's broadcast receiver into an SSE stream
pub fn sse_stream(
    chat_id: String,
    broadcast_rx: broadcast::Receiver<Outbound>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(Event::default()
            .event("init")
            .data(json!({ "type": "init", "chat_id": chat_id }).to_string()))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(outbound) => Some(Ok(outbound_to_axum(&outbound))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn outbound_to_axum(outbound: &Outbound) -> Event {
    let data = serde_json::to_string(outbound).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("message").data(data)
}
