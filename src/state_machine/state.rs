//! Session progress types

use serde::Serialize;
use std::collections::HashMap;

/// Where a session is in the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormState {
    /// Waiting for the answer to `fields[step]`
    Collecting { step: usize },
    /// All fields answered, review shown
    Reviewing,
    /// Re-entering one field from the review
    Modifying { field: String },
}

impl Default for FormState {
    fn default() -> Self {
        Self::Collecting { step: 0 }
    }
}

impl FormState {
    /// Position in the form used to check that steps only move forward.
    /// Review and modification both sit past the last field.
    pub fn position(&self, field_count: usize) -> usize {
        match self {
            Self::Collecting { step } => *step,
            Self::Reviewing | Self::Modifying { .. } => field_count,
        }
    }
}

/// Answers captured by one session, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Answers(HashMap<String, String>);

impl Answers {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Append an uploaded asset to a comma-separated list
    pub fn append(&mut self, field: &str, value: &str) {
        match self.0.get_mut(field) {
            Some(existing) if !existing.is_empty() => {
                existing.push(',');
                existing.push_str(value);
            }
            _ => self.set(field, value),
        }
    }
}

/// State plus answers of a live session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub state: FormState,
    pub answers: Answers,
}

impl Progress {
    pub fn new(state: FormState, answers: Answers) -> Self {
        Self { state, answers }
    }

    pub fn collecting(step: usize, answers: Answers) -> Self {
        Self::new(FormState::Collecting { step }, answers)
    }
}
