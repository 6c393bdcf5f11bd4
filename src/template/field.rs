//! Field definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of answer a field collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Email,
    Select,
    File,
    Photo,
    Video,
    Document,
}

impl FieldKind {
    pub const ALL: [FieldKind; 8] = [
        FieldKind::Text,
        FieldKind::Number,
        FieldKind::Email,
        FieldKind::Select,
        FieldKind::File,
        FieldKind::Photo,
        FieldKind::Video,
        FieldKind::Document,
    ];

    /// Fields whose prompt is a media file shipped with the form
    pub fn is_media(self) -> bool {
        matches!(self, Self::Photo | Self::Video | Self::Document)
    }

    /// Fields that collect assets uploaded by the user
    pub fn accepts_uploads(self) -> bool {
        matches!(self, Self::File)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Email => "email",
            Self::Select => "select",
            Self::File => "file",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markup used when rendering a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextFormat {
    Markdown,
    #[serde(rename = "HTML")]
    Html,
}

/// Inline button shown under a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

/// Validation rule-set of a field.
///
/// `max_length == 0` means no upper length limit. Numeric bounds are
/// optional: an absent bound is unbounded, while an explicit `0` is a
/// real bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub min_length: usize,
    pub max_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

/// One question of the form, fully resolved at load time
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub skippable: bool,
    /// Prompt text, or caption for media fields
    pub description: String,
    pub format: Option<TextFormat>,
    /// Absolute location of the media shown by photo/video/document fields
    pub media: Option<PathBuf>,
    pub buttons: Vec<Button>,
    pub options: Vec<String>,
    pub rules: Rules,
    /// Storage column type resolved for the form's dialect
    pub column: Option<String>,
}

impl FieldSpec {
    /// Minimal field used by tests and programmatic forms
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            required: false,
            skippable: false,
            description: String::new(),
            format: None,
            media: None,
            buttons: Vec::new(),
            options: Vec::new(),
            rules: Rules::default(),
            column: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}
