//! Field validators
//!
//! Pure functions from (field, raw input) to an outcome. Nothing here
//! touches a session or the template, so validators are safe to call
//! from any number of sessions at once.

use crate::template::{FieldKind, FieldSpec, MessageKey, Messages};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,3}$")
        .expect("email regex is valid")
});

/// Why an input was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Text sent back to the user
    pub user_message: String,
    /// Detail for the logs only
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted(String),
    Rejected(Rejection),
}

impl ValidationOutcome {
    fn reject(user_message: String, reason: impl Into<String>) -> Self {
        Self::Rejected(Rejection {
            user_message,
            reason: reason.into(),
        })
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Validate `raw` against the rules of `field`
pub fn validate(field: &FieldSpec, messages: &Messages, raw: &str) -> ValidationOutcome {
    if raw.is_empty() {
        if field.skippable {
            return ValidationOutcome::Accepted(String::new());
        }
        if field.required {
            return if field.kind.accepts_uploads() || field.kind.is_media() {
                ValidationOutcome::reject(
                    messages.render(MessageKey::RequiredFile, &[&field.label]),
                    format!("{}: file required", field.name),
                )
            } else {
                ValidationOutcome::reject(
                    messages.render(MessageKey::RequiredInput, &[&field.label]),
                    format!("{}: value required", field.name),
                )
            };
        }
    }

    match field.kind {
        FieldKind::Text => validate_text(field, messages, raw),
        FieldKind::Number => validate_number(field, messages, raw),
        FieldKind::Email => validate_email(field, messages, raw),
        FieldKind::Select => validate_select(field, messages, raw),
        FieldKind::File | FieldKind::Photo | FieldKind::Video | FieldKind::Document => {
            ValidationOutcome::Accepted(raw.to_string())
        }
    }
}

fn validate_text(field: &FieldSpec, messages: &Messages, raw: &str) -> ValidationOutcome {
    let rules = &field.rules;
    let length = raw.chars().count();

    if length < rules.min_length {
        return ValidationOutcome::reject(
            messages.render(MessageKey::InvalidMinLength, &[&field.label, &rules.min_length]),
            format!("{}: length {length} below {}", field.name, rules.min_length),
        );
    }
    if rules.max_length > 0 && length > rules.max_length {
        return ValidationOutcome::reject(
            messages.render(MessageKey::InvalidMaxLength, &[&field.label, &rules.max_length]),
            format!("{}: length {length} above {}", field.name, rules.max_length),
        );
    }

    if let Some(pattern) = rules.regex.as_deref().filter(|p| !p.is_empty()) {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(raw) => {}
            Ok(_) => {
                return ValidationOutcome::reject(
                    messages.render(MessageKey::InvalidFormat, &[&field.label]),
                    format!("{}: no match for /{pattern}/", field.name),
                );
            }
            Err(e) => {
                return ValidationOutcome::reject(
                    messages.render(MessageKey::ValidationError, &[&field.label]),
                    format!("{}: regex compile failed: {e}", field.name),
                );
            }
        }
    }

    ValidationOutcome::Accepted(raw.to_string())
}

fn validate_number(field: &FieldSpec, messages: &Messages, raw: &str) -> ValidationOutcome {
    let Ok(value) = raw.trim().parse::<i64>() else {
        return ValidationOutcome::reject(
            messages.render(MessageKey::InvalidNumber, &[&field.label]),
            format!("{}: '{raw}' is not an integer", field.name),
        );
    };

    if let Some(min) = field.rules.min {
        if value < min {
            return ValidationOutcome::reject(
                messages.render(MessageKey::InvalidMinNumber, &[&field.label, &min]),
                format!("{}: {value} below {min}", field.name),
            );
        }
    }
    if let Some(max) = field.rules.max {
        if value > max {
            return ValidationOutcome::reject(
                messages.render(MessageKey::InvalidMaxNumber, &[&field.label, &max]),
                format!("{}: {value} above {max}", field.name),
            );
        }
    }

    ValidationOutcome::Accepted(value.to_string())
}

fn validate_email(field: &FieldSpec, messages: &Messages, raw: &str) -> ValidationOutcome {
    if EMAIL.is_match(raw) {
        ValidationOutcome::Accepted(raw.to_string())
    } else {
        ValidationOutcome::reject(
            messages.get(MessageKey::InvalidEmail).to_string(),
            format!("{}: '{raw}' is not an email address", field.name),
        )
    }
}

fn validate_select(field: &FieldSpec, messages: &Messages, raw: &str) -> ValidationOutcome {
    if field.options.iter().any(|option| option == raw) {
        ValidationOutcome::Accepted(raw.to_string())
    } else {
        let allowed = field.options.join(", ");
        ValidationOutcome::reject(
            messages.render(MessageKey::RequiredSelect, &[&field.label, &allowed]),
            format!("{}: '{raw}' is not one of [{allowed}]", field.name),
        )
    }
}
