//! Outbound messages for prompts, review and uploads

use super::effect::Outbound;
use super::event::{FINISH_UPLOADING, MODIFY_PREFIX, SKIP, SUBMIT, UPLOAD_ANOTHER};
use super::state::Answers;
use crate::template::{Button, FieldSpec, FormTemplate, MessageKey, TextFormat};
use std::fmt::Write as _;

/// Prompt for a field: the description (or media), then its buttons
pub fn field_prompt(template: &FormTemplate, field: &FieldSpec) -> Vec<Outbound> {
    let messages = template.messages();
    let mut out = Vec::with_capacity(2);

    match (&field.media, field.kind.is_media()) {
        (Some(location), true) => out.push(Outbound::Media {
            kind: field.kind,
            location: location.clone(),
            caption: field.description.clone(),
            format: field.format,
        }),
        _ => out.push(Outbound::text(field.description.clone()).with_format(field.format)),
    }

    let mut rows: Vec<Vec<Button>> = field.buttons.iter().cloned().map(|b| vec![b]).collect();
    if field.skippable {
        rows.push(vec![Button::new(messages.get(MessageKey::SkipButton), SKIP)]);
    }
    if !rows.is_empty() {
        out.push(Outbound::text(messages.get(MessageKey::ChooseOption)).with_keyboard(rows));
    }
    out
}

/// Every answer with a modify button per field and the submit button
pub fn review(template: &FormTemplate, answers: &Answers) -> Outbound {
    let messages = template.messages();
    let mut text = String::new();
    text.push_str(messages.get(MessageKey::Review));
    text.push_str("\n\n");
    for field in template.fields() {
        let value = match answers.get(&field.name) {
            Some(value) if !value.is_empty() => escape_html(value),
            _ => escape_html(messages.get(MessageKey::NotProvided)),
        };
        let _ = writeln!(text, "<b>{}:</b> {value}", escape_html(&field.label));
    }

    let mut rows: Vec<Vec<Button>> = template
        .fields()
        .iter()
        .map(|field| {
            vec![Button::new(
                messages.render(MessageKey::ModifyButton, &[&field.label]),
                format!("{MODIFY_PREFIX}{}", field.name),
            )]
        })
        .collect();
    rows.push(vec![Button::new(messages.get(MessageKey::SubmitButton), SUBMIT)]);

    Outbound::text(text)
        .with_format(Some(TextFormat::Html))
        .with_keyboard(rows)
}

pub fn modify_prompt(template: &FormTemplate, field: &FieldSpec) -> Outbound {
    Outbound::text(
        template
            .messages()
            .render(MessageKey::Modify, &[&field.label]),
    )
}

/// Acknowledge an upload and offer another one
pub fn upload_received(template: &FormTemplate) -> Vec<Outbound> {
    let messages = template.messages();
    vec![
        Outbound::text(messages.get(MessageKey::FileUploadSuccess)),
        Outbound::text(messages.get(MessageKey::FinishUpload)).with_keyboard(vec![vec![
            Button::new(messages.get(MessageKey::UploadAnotherButton), UPLOAD_ANOTHER),
            Button::new(messages.get(MessageKey::FinishUploadButton), FINISH_UPLOADING),
        ]]),
    ]
}

pub fn message(template: &FormTemplate, key: MessageKey) -> Outbound {
    Outbound::text(template.messages().get(key))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
