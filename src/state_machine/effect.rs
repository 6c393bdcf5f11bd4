//! Effects produced by state transitions

use crate::submission::SubmissionEvent;
use crate::template::{Button, FieldKind, TextFormat};
use serde::Serialize;
use std::path::PathBuf;

/// Instruction for the chat transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<TextFormat>,
        /// Button rows
        #[serde(skip_serializing_if = "Vec::is_empty")]
        keyboard: Vec<Vec<Button>>,
    },
    Media {
        kind: FieldKind,
        location: PathBuf,
        caption: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<TextFormat>,
    },
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            format: None,
            keyboard: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, rows: Vec<Vec<Button>>) -> Self {
        if let Self::Text { keyboard, .. } = &mut self {
            *keyboard = rows;
        }
        self
    }

    #[must_use]
    pub fn with_format(mut self, new_format: Option<TextFormat>) -> Self {
        match &mut self {
            Self::Text { format, .. } | Self::Media { format, .. } => *format = new_format,
        }
        self
    }

    /// Text or caption
    pub fn body(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Media { caption, .. } => caption,
        }
    }
}

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send something to the user
    Reply(Outbound),
    /// Persist and dispatch a completed form
    Finalize(SubmissionEvent),
    /// Log a rejected input; never shown to the user
    Diagnostic { field: String, reason: String },
}
