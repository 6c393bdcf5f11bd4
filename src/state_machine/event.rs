//! Inbound events from the chat transport

pub const SKIP: &str = "skip";
pub const SUBMIT: &str = "submit";
pub const UPLOAD_ANOTHER: &str = "upload_another";
pub const FINISH_UPLOADING: &str = "finish_uploading";
pub const MODIFY_PREFIX: &str = "modify_";

/// Whether button data collides with an engine action
pub fn is_reserved_action(data: &str) -> bool {
    matches!(data, SKIP | SUBMIT | UPLOAD_ANOTHER | FINISH_UPLOADING)
        || data.starts_with(MODIFY_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    End,
    Help,
}

/// Events that drive a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    /// Free text typed by the user
    Text(String),
    /// Data of a pressed button
    Callback(String),
    /// An asset the user uploaded, by its retrievable location
    Upload { url: String },
}

/// Meaning of button data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    Skip,
    Submit,
    Modify(&'a str),
    UploadAnother,
    FinishUpload,
    /// Any other button: answers the current field
    Choice(&'a str),
}

impl<'a> Action<'a> {
    pub fn parse(data: &'a str) -> Self {
        match data {
            SKIP => Self::Skip,
            SUBMIT => Self::Submit,
            UPLOAD_ANOTHER => Self::UploadAnother,
            FINISH_UPLOADING => Self::FinishUpload,
            _ => match data.strip_prefix(MODIFY_PREFIX) {
                Some(field) => Self::Modify(field),
                None => Self::Choice(data),
            },
        }
    }
}
