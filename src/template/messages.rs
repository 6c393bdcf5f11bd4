//! User-facing message texts
//!
//! Every message key has a fixed number of `%s`/`%d`/`%v` placeholders.
//! Forms may override any text; overrides are checked against that count
//! when the form is loaded.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("%[sdv]").expect("placeholder regex is valid"));

/// Key of a configurable message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKey {
    Submit,
    SubmitButton,
    SkipButton,
    Modify,
    ModifyButton,
    ChooseOption,
    Review,
    NotProvided,
    FileUploadSuccess,
    UploadAnother,
    UploadAnotherButton,
    FinishUploadButton,
    FinishUpload,
    RequiredFile,
    RequiredSelect,
    RequiredInput,
    InvalidEmail,
    InvalidMaxNumber,
    InvalidMinNumber,
    InvalidNumber,
    InvalidFormat,
    ValidationError,
    InvalidMaxLength,
    InvalidMinLength,
    InvalidAction,
    SessionEnded,
    SendFailed,
    Help,
}

impl MessageKey {
    /// Number of substitutions the message receives when rendered
    pub const fn placeholders(self) -> usize {
        match self {
            Self::Submit
            | Self::SubmitButton
            | Self::SkipButton
            | Self::ChooseOption
            | Self::Review
            | Self::NotProvided
            | Self::FileUploadSuccess
            | Self::UploadAnother
            | Self::UploadAnotherButton
            | Self::FinishUploadButton
            | Self::FinishUpload
            | Self::InvalidEmail
            | Self::InvalidAction
            | Self::SessionEnded
            | Self::SendFailed
            | Self::Help => 0,
            Self::Modify
            | Self::ModifyButton
            | Self::RequiredFile
            | Self::RequiredInput
            | Self::InvalidNumber
            | Self::InvalidFormat
            | Self::ValidationError => 1,
            Self::RequiredSelect
            | Self::InvalidMaxNumber
            | Self::InvalidMinNumber
            | Self::InvalidMaxLength
            | Self::InvalidMinLength => 2,
        }
    }

    pub const fn default_text(self) -> &'static str {
        match self {
            Self::Submit => "🎉 Thank you for submitting the form! 🎉",
            Self::SubmitButton => "✅ Submit",
            Self::SkipButton => "⏭️ Skip",
            Self::Modify => "Please enter a new value for %s:",
            Self::ModifyButton => "✏️ Modify %s",
            Self::ChooseOption => "Choose an option:",
            Self::Review => "📝 <b>Review Your Inputs:</b>",
            Self::NotProvided => "Not provided",
            Self::FileUploadSuccess => "File uploaded successfully!",
            Self::UploadAnother => "Please upload another file",
            Self::UploadAnotherButton => "Upload another file",
            Self::FinishUploadButton => "Finish uploading",
            Self::FinishUpload => "Do you want to upload another file or finish uploading?",
            Self::RequiredFile => "Oops! A file is required for %s. Please upload a file.",
            Self::RequiredSelect => "Oops! A selection is required. The input for %s must be one of the following options: %s. Please choose one.",
            Self::RequiredInput => "Oops! This %s is required. Please provide a value.",
            Self::InvalidEmail => "Oops! This doesn't look like a valid email address. Please check and try again.",
            Self::InvalidMaxNumber => "Oops! The value for %s must be at most %d. Please provide a valid number.",
            Self::InvalidMinNumber => "Oops! The value for %s must be at least %d. Please provide a valid number.",
            Self::InvalidNumber => "Oops! Please enter a valid number for %s.",
            Self::InvalidFormat => "Oops! The input for %s doesn't match the required format. Please make sure it's correct.",
            Self::ValidationError => "Oops! Something went wrong while validating your input for %s. Please try again.",
            Self::InvalidMaxLength => "Oops! This input for %s is too long. Please provide no more than %d characters.",
            Self::InvalidMinLength => "Oops! This input for %s is too short. Please provide at least %d characters.",
            Self::InvalidAction => "Oops! That action isn't available right now.",
            Self::SessionEnded => "Your session has been ended. Thank you for using the bot.",
            Self::SendFailed => "Failed to send the content. Please try again later.",
            Self::Help => "Welcome to the bot! Here are the available commands:\n/start - Start a new session\n/end - End the current session\n/help - Show this help message",
        }
    }
}

impl Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Message texts of a form: built-in defaults plus per-form overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Messages {
    overrides: HashMap<MessageKey, String>,
}

impl Messages {
    pub fn with_override(mut self, key: MessageKey, text: impl Into<String>) -> Self {
        self.overrides.insert(key, text.into());
        self
    }

    /// Raw text of a message (blank overrides fall back to the default)
    pub fn get(&self, key: MessageKey) -> &str {
        match self.overrides.get(&key) {
            Some(text) if !text.trim().is_empty() => text,
            _ => key.default_text(),
        }
    }

    /// Text of a message with its placeholders substituted in order
    pub fn render(&self, key: MessageKey, args: &[&dyn Display]) -> String {
        fill_placeholders(self.get(key), args)
    }

    /// Overrides whose placeholder count does not match their key
    pub fn placeholder_mismatches(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .overrides
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .filter_map(|(key, text)| {
                let found = count_placeholders(text);
                let expected = key.placeholders();
                (found != expected).then(|| {
                    format!("message '{key}' expects {expected} placeholder(s), but found {found}")
                })
            })
            .collect();
        problems.sort();
        problems
    }
}

pub fn count_placeholders(text: &str) -> usize {
    PLACEHOLDER.find_iter(text).count()
}

/// Substitute `%s`/`%d`/`%v` left to right; surplus placeholders stay verbatim
pub fn fill_placeholders(template: &str, args: &[&dyn Display]) -> String {
    let mut args = args.iter();
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| match args.next() {
            Some(arg) => arg.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
