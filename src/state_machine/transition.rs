//! Pure state transition function
//!
//! Given the same progress, template and event this always produces the
//! same result. Sending, persisting and dispatching happen in the engine.

use super::effect::{Effect, Outbound};
use super::event::{Action, Command, Event};
use super::render;
use super::state::{Answers, FormState, Progress};
use crate::submission::SubmissionEvent;
use crate::template::{FieldSpec, FormTemplate, MessageKey};
use crate::validate::{validate, ValidationOutcome};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    /// `None` once the session is finished (submitted or ended)
    pub next: Option<Progress>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(next: Progress) -> Self {
        Self {
            next: Some(next),
            effects: vec![],
        }
    }

    pub fn ended() -> Self {
        Self {
            next: None,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_reply(self, outbound: Outbound) -> Self {
        self.with_effect(Effect::Reply(outbound))
    }

    #[must_use]
    pub fn with_replies(mut self, outbound: impl IntoIterator<Item = Outbound>) -> Self {
        self.effects.extend(outbound.into_iter().map(Effect::Reply));
        self
    }

    /// Submission produced by this transition, if any
    pub fn submission(&self) -> Option<&SubmissionEvent> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Finalize(event) => Some(event),
            _ => None,
        })
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("field '{0}' cannot be skipped")]
    NotSkippable(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
}

pub fn transition(
    progress: &Progress,
    template: &FormTemplate,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&progress.state, event) {
        // Commands apply in every state
        (_, Event::Command(Command::Start)) => Ok(enter_step(template, 0, Answers::default())),
        (_, Event::Command(Command::End)) => Ok(TransitionResult::ended()
            .with_reply(render::message(template, MessageKey::SessionEnded))),
        (_, Event::Command(Command::Help)) => Ok(TransitionResult::new(progress.clone())
            .with_reply(render::message(template, MessageKey::Help))),

        (FormState::Collecting { step }, Event::Text(text)) => {
            let field = current_field(template, *step)?;
            Ok(answer(template, progress, *step, field, &text))
        }

        (FormState::Collecting { step }, Event::Callback(data)) => {
            let field = current_field(template, *step)?;
            match Action::parse(&data) {
                Action::Choice(value) => Ok(answer(template, progress, *step, field, value)),
                Action::Skip => {
                    if !field.skippable {
                        return Err(TransitionError::NotSkippable(field.name.clone()));
                    }
                    Ok(answer(template, progress, *step, field, ""))
                }
                Action::UploadAnother => {
                    expect_uploads(field)?;
                    Ok(TransitionResult::new(progress.clone())
                        .with_reply(render::message(template, MessageKey::UploadAnother)))
                }
                Action::FinishUpload => {
                    expect_uploads(field)?;
                    let collected = progress.answers.get(&field.name).unwrap_or_default();
                    Ok(answer(template, progress, *step, field, collected))
                }
                Action::Submit | Action::Modify(_) => Err(TransitionError::InvalidAction(
                    format!("'{data}' while collecting '{}'", field.name),
                )),
            }
        }

        (FormState::Collecting { step }, Event::Upload { url }) => {
            let field = current_field(template, *step)?;
            expect_uploads(field)?;
            let mut answers = progress.answers.clone();
            answers.append(&field.name, &url);
            Ok(TransitionResult::new(Progress::collecting(*step, answers))
                .with_replies(render::upload_received(template)))
        }

        (FormState::Reviewing, Event::Callback(data)) => match Action::parse(&data) {
            Action::Submit => Ok(finalize(template, &progress.answers)),
            Action::Modify(name) => start_modifying(template, progress, name),
            _ => Err(TransitionError::InvalidAction(format!("'{data}' during review"))),
        },

        (FormState::Reviewing, Event::Text(_) | Event::Upload { .. }) => Err(
            TransitionError::InvalidAction("input during review".to_string()),
        ),

        (FormState::Modifying { field }, Event::Text(text)) => {
            let spec = named_field(template, field)?;
            Ok(modify(template, progress, spec, &text))
        }

        (FormState::Modifying { field }, Event::Callback(data)) => {
            let spec = named_field(template, field)?;
            match Action::parse(&data) {
                Action::Choice(value) => Ok(modify(template, progress, spec, value)),
                Action::Skip => {
                    if !spec.skippable {
                        return Err(TransitionError::NotSkippable(spec.name.clone()));
                    }
                    Ok(modify(template, progress, spec, ""))
                }
                Action::Modify(name) => start_modifying(template, progress, name),
                Action::Submit => Ok(finalize(template, &progress.answers)),
                Action::UploadAnother | Action::FinishUpload => Err(
                    TransitionError::InvalidAction(format!("'{data}' while modifying '{field}'")),
                ),
            }
        }

        // A replacement upload overwrites the earlier assets
        (FormState::Modifying { field }, Event::Upload { url }) => {
            let spec = named_field(template, field)?;
            expect_uploads(spec)?;
            Ok(modify(template, progress, spec, &url))
        }
    }
}

fn current_field(template: &FormTemplate, step: usize) -> Result<&FieldSpec, TransitionError> {
    template
        .field_at(step)
        .ok_or_else(|| TransitionError::InvalidAction(format!("no field at step {step}")))
}

fn named_field<'t>(template: &'t FormTemplate, name: &str) -> Result<&'t FieldSpec, TransitionError> {
    template
        .field(name)
        .ok_or_else(|| TransitionError::UnknownField(name.to_string()))
}

fn expect_uploads(field: &FieldSpec) -> Result<(), TransitionError> {
    if field.kind.accepts_uploads() {
        Ok(())
    } else {
        Err(TransitionError::InvalidAction(format!(
            "'{}' is a {} field and takes no uploads",
            field.name, field.kind
        )))
    }
}

/// Show the prompt of `fields[step]`
fn enter_step(template: &FormTemplate, step: usize, answers: Answers) -> TransitionResult {
    let replies = template
        .field_at(step)
        .map(|field| render::field_prompt(template, field))
        .unwrap_or_default();
    TransitionResult::new(Progress::collecting(step, answers)).with_replies(replies)
}

fn rejected(progress: &Progress, field: &FieldSpec, user_message: String, reason: String) -> TransitionResult {
    TransitionResult::new(progress.clone())
        .with_reply(Outbound::text(user_message))
        .with_effect(Effect::Diagnostic {
            field: field.name.clone(),
            reason,
        })
}

/// Validate an answer for the field being collected and move on
fn answer(
    template: &FormTemplate,
    progress: &Progress,
    step: usize,
    field: &FieldSpec,
    raw: &str,
) -> TransitionResult {
    match validate(field, template.messages(), raw) {
        ValidationOutcome::Rejected(rejection) => {
            rejected(progress, field, rejection.user_message, rejection.reason)
        }
        ValidationOutcome::Accepted(value) => {
            let mut answers = progress.answers.clone();
            answers.set(field.name.clone(), value);
            advance(template, step, answers)
        }
    }
}

fn advance(template: &FormTemplate, step: usize, answers: Answers) -> TransitionResult {
    let next = step + 1;
    if next < template.len() {
        enter_step(template, next, answers)
    } else if template.review_enabled() {
        let review = render::review(template, &answers);
        TransitionResult::new(Progress::new(FormState::Reviewing, answers)).with_reply(review)
    } else {
        finalize(template, &answers)
    }
}

fn start_modifying(
    template: &FormTemplate,
    progress: &Progress,
    name: &str,
) -> Result<TransitionResult, TransitionError> {
    let field = named_field(template, name)?;
    let next = Progress::new(
        FormState::Modifying {
            field: field.name.clone(),
        },
        progress.answers.clone(),
    );
    Ok(TransitionResult::new(next).with_reply(render::modify_prompt(template, field)))
}

fn modify(template: &FormTemplate, progress: &Progress, field: &FieldSpec, raw: &str) -> TransitionResult {
    match validate(field, template.messages(), raw) {
        ValidationOutcome::Rejected(rejection) => {
            rejected(progress, field, rejection.user_message, rejection.reason)
        }
        ValidationOutcome::Accepted(value) => {
            let mut answers = progress.answers.clone();
            answers.set(field.name.clone(), value);
            let review = render::review(template, &answers);
            TransitionResult::new(Progress::new(FormState::Reviewing, answers)).with_reply(review)
        }
    }
}

/// Snapshot the answers and end the session
fn finalize(template: &FormTemplate, answers: &Answers) -> TransitionResult {
    TransitionResult::ended()
        .with_effect(Effect::Finalize(SubmissionEvent::capture(template, answers)))
        .with_reply(render::message(template, MessageKey::Submit))
}
