//! API request and response types

use crate::state_machine::{Command, Event};
use crate::template::{FieldKind, FormTemplate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Start,
    End,
    Help,
}

/// Inbound chat event
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundRequest {
    Command { command: CommandName },
    Text { text: String },
    Callback { data: String },
    Upload { url: String },
}

impl From<InboundRequest> for Event {
    fn from(request: InboundRequest) -> Self {
        match request {
            InboundRequest::Command { command } => Event::Command(match command {
                CommandName::Start => Command::Start,
                CommandName::End => Command::End,
                CommandName::Help => Command::Help,
            }),
            InboundRequest::Text { text } => Event::Text(text),
            InboundRequest::Callback { data } => Event::Callback(data),
            InboundRequest::Upload { url } => Event::Upload { url },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub skippable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Public shape of the loaded form
#[derive(Debug, Serialize)]
pub struct FormSummary {
    pub form_name: String,
    pub review: bool,
    pub fields: Vec<FieldSummary>,
    pub active_sessions: usize,
}

impl FormSummary {
    pub fn new(template: &FormTemplate, active_sessions: usize) -> Self {
        Self {
            form_name: template.form_name().to_string(),
            review: template.review_enabled(),
            fields: template
                .fields()
                .iter()
                .map(|f| FieldSummary {
                    name: f.name.clone(),
                    label: f.label.clone(),
                    kind: f.kind,
                    required: f.required,
                    skippable: f.skippable,
                    options: f.options.clone(),
                })
                .collect(),
            active_sessions,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
