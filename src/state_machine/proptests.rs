//! Property-based tests for the state machine
//!
//! Random event sequences against a fixed form, checking the invariants
//! that must hold after every step.

use super::effect::Effect;
use super::event::{Command, Event};
use super::state::{FormState, Progress};
use super::transition::transition;
use crate::template::{FieldKind, FieldSpec, FormTemplate, Rules};
use proptest::prelude::*;

fn test_template(review: bool) -> FormTemplate {
    FormTemplate::new(
        "Survey",
        "survey",
        vec![
            FieldSpec::new("name", FieldKind::Text).required().with_rules(Rules {
                min_length: 2,
                ..Rules::default()
            }),
            FieldSpec::new("age", FieldKind::Number).with_rules(Rules {
                min: Some(0),
                max: Some(120),
                ..Rules::default()
            }),
            FieldSpec::new("color", FieldKind::Select)
                .with_options(["red", "green"])
                .skippable(),
            FieldSpec::new("files", FieldKind::File),
            FieldSpec::new("mail", FieldKind::Email).required(),
        ],
    )
    .unwrap()
    .with_review(review)
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => Just(Event::Command(Command::Start)),
        1 => Just(Event::Command(Command::Help)),
        6 => prop_oneof![
            Just("a".to_string()),
            Just("Ada".to_string()),
            Just("42".to_string()),
            Just("500".to_string()),
            Just("red".to_string()),
            Just("ada@example.com".to_string()),
            Just(String::new()),
        ]
        .prop_map(Event::Text),
        4 => prop_oneof![
            Just("skip"),
            Just("submit"),
            Just("green"),
            Just("finish_uploading"),
            Just("upload_another"),
            Just("modify_age"),
            Just("modify_color"),
            Just("modify_ghost"),
        ]
        .prop_map(|data| Event::Callback(data.to_string())),
        2 => "[a-z]{1,6}".prop_map(|name| Event::Upload { url: format!("https://files/{name}") }),
    ]
}

proptest! {
    #[test]
    fn step_only_regresses_on_start(
        review in any::<bool>(),
        events in proptest::collection::vec(arb_event(), 1..40),
    ) {
        let template = test_template(review);
        let mut progress = Progress::default();
        for event in events {
            let is_start = event == Event::Command(Command::Start);
            let before = progress.state.position(template.len());
            let Ok(result) = transition(&progress, &template, event) else {
                continue;
            };
            let Some(next) = result.next else {
                progress = Progress::default();
                continue;
            };
            if !is_start {
                prop_assert!(next.state.position(template.len()) >= before);
            }
            progress = next;
        }
    }

    #[test]
    fn finalize_ends_the_session_and_carries_every_field(
        review in any::<bool>(),
        events in proptest::collection::vec(arb_event(), 1..40),
    ) {
        let template = test_template(review);
        let mut progress = Progress::default();
        for event in events {
            let Ok(result) = transition(&progress, &template, event) else {
                continue;
            };
            let finals = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::Finalize(_)))
                .count();
            prop_assert!(finals <= 1);
            if let Some(submission) = result.submission() {
                prop_assert!(result.next.is_none());
                prop_assert_eq!(submission.values.len(), template.len());
            }
            progress = result.next.unwrap_or_default();
        }
    }

    #[test]
    fn answers_only_hold_template_fields(
        events in proptest::collection::vec(arb_event(), 1..40),
    ) {
        let template = test_template(true);
        let mut progress = Progress::default();
        for event in events {
            if let Ok(result) = transition(&progress, &template, event) {
                progress = result.next.unwrap_or_default();
            }
            if let FormState::Modifying { field } = &progress.state {
                prop_assert!(template.field(field).is_some());
            }
            let json = serde_json::to_value(&progress.answers).unwrap();
            for key in json.as_object().unwrap().keys() {
                prop_assert!(template.field(key).is_some(), "stray answer {}", key);
            }
        }
    }

    #[test]
    fn rejected_input_leaves_progress_unchanged(
        step in 0usize..5,
        raw in "[a-z0-9@.]{0,4}",
    ) {
        let template = test_template(false);
        let progress = Progress::collecting(step, Default::default());
        if let Ok(result) = transition(&progress, &template, Event::Text(raw)) {
            let diagnosed = result
                .effects
                .iter()
                .any(|e| matches!(e, Effect::Diagnostic { .. }));
            if diagnosed {
                prop_assert_eq!(result.next, Some(progress));
            }
        }
    }
}
