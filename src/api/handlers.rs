//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{AcceptedResponse, ErrorResponse, FormSummary, InboundRequest};
use super::AppState;
use crate::engine::{SessionSnapshot, TransportError};
use crate::session::ChatId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Form metadata
        .route("/api/form", get(get_form))
        // Session inspection
        .route("/api/chats/:id", get(get_session))
        // Inbound events
        .route("/api/chats/:id/events", post(post_event))
        // Outbound replies
        .route("/api/chats/:id/stream", get(stream_chat))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn get_form(State(state): State<AppState>) -> Json<FormSummary> {
    Json(FormSummary::new(
        state.engine.template(),
        state.engine.active_sessions(),
    ))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state
        .engine
        .snapshot(&ChatId::new(id.clone()))
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No active session for chat {id}")))
}

async fn post_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<InboundRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    let chat_id = ChatId::new(id);
    // Replies would have nowhere to go
    if !state.hub.is_connected(&chat_id) {
        return Err(AppError::Conflict(format!(
            "Chat {chat_id} has no open stream"
        )));
    }

    state.engine.handle(&chat_id, request.into()).await?;
    Ok(Json(AcceptedResponse { accepted: true }))
}

async fn stream_chat(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let broadcast_rx = state.hub.subscribe(&ChatId::new(id.clone()));
    tracing::debug!(chat_id = %id, "Chat stream opened");
    sse_stream(id, broadcast_rx)
}

async fn get_version() -> &'static str {
    concat!("formflow ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Conflict(String),
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unreachable(_) => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatHub;
    use crate::engine::FormEngine;
    use crate::persistence::Persistence;
    use crate::state_machine::Outbound;
    use crate::template::{FieldKind, FieldSpec, FormTemplate, MessageKey};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    async fn serve() -> (String, AppState) {
        let template = FormTemplate::new(
            "Signup",
            "signups",
            vec![
                FieldSpec::new("name", FieldKind::Text).required(),
                FieldSpec::new("plan", FieldKind::Select).with_options(["free", "pro"]),
            ],
        )
        .unwrap();
        let engine = FormEngine::new(
            Arc::new(template),
            Arc::new(ChatHub::default()),
            Persistence::disabled(),
            None,
            Duration::from_secs(60),
        );
        let state = AppState::new(engine);
        let app = create_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    async fn post(base: &str, chat: &str, body: Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{base}/api/chats/{chat}/events"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn form_summary_lists_fields() {
        let (base, _state) = serve().await;
        let body: Value = reqwest::get(format!("{base}/api/form"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["form_name"], "Signup");
        assert_eq!(body["fields"][0]["name"], "name");
        assert_eq!(body["fields"][1]["options"], json!(["free", "pro"]));
        assert_eq!(body["active_sessions"], 0);
    }

    #[tokio::test]
    async fn event_without_stream_is_a_conflict() {
        let (base, state) = serve().await;
        let response = post(&base, "7", json!({"type": "command", "command": "start"})).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(state.engine.snapshot(&ChatId::from("7")).await.is_none());
    }

    #[tokio::test]
    async fn events_drive_the_session_and_replies_reach_the_stream() {
        let (base, state) = serve().await;
        let chat = ChatId::from("42");
        let mut rx = state.hub.subscribe(&chat);

        let response = post(&base, "42", json!({"type": "command", "command": "start"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(matches!(rx.recv().await.unwrap(), Outbound::Text { .. }));

        post(&base, "42", json!({"type": "text", "text": "Ada"})).await;
        let snapshot: Value = reqwest::get(format!("{base}/api/chats/42"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["chat_id"], "42");
        assert_eq!(snapshot["answers"]["name"], "Ada");

        // Prompt for the select field
        rx.recv().await.unwrap();
        post(&base, "42", json!({"type": "callback", "data": "pro"})).await;
        let last = rx.recv().await.unwrap();
        assert_eq!(last.body(), MessageKey::Submit.default_text());

        let response = reqwest::get(format!("{base}/api/chats/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unreachable_chat_maps_to_conflict() {
        let error = AppError::from(TransportError::Unreachable(ChatId::from("9")));
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn malformed_event_is_rejected() {
        let (base, state) = serve().await;
        let _rx = state.hub.subscribe(&ChatId::from("1"));
        let response = post(&base, "1", json!({"type": "shout", "text": "hey"})).await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn version_names_the_crate() {
        let (base, _state) = serve().await;
        let text = reqwest::get(format!("{base}/version"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(text.starts_with("formflow "));
    }
}
