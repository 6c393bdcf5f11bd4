//! Completed submissions

use crate::state_machine::state::Answers;
use crate::template::FormTemplate;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Immutable snapshot of a finished form, detached from any session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEvent {
    pub form_name: String,
    /// Final values in field order
    pub values: Vec<(String, String)>,
}

impl SubmissionEvent {
    /// Copy the answers of a session in template field order.
    /// Unanswered fields are captured as empty strings.
    pub fn capture(template: &FormTemplate, answers: &Answers) -> Self {
        let values = template
            .fields()
            .iter()
            .map(|field| {
                let value = answers.get(&field.name).unwrap_or_default();
                (field.name.clone(), value.to_string())
            })
            .collect();
        Self {
            form_name: template.form_name().to_string(),
            values,
        }
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

struct OrderedData<'a>(&'a [(String, String)]);

impl Serialize for OrderedData<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Wire shape: `{"event": <form name>, "data": {<field>: <value>, ...}}`
impl Serialize for SubmissionEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("event", &self.form_name)?;
        map.serialize_entry("data", &OrderedData(&self.values))?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{FieldKind, FieldSpec};

    #[test]
    fn capture_follows_field_order_and_serializes_as_payload() {
        let template = FormTemplate::new(
            "Signup",
            "signups",
            vec![
                FieldSpec::new("name", FieldKind::Text),
                FieldSpec::new("age", FieldKind::Number),
                FieldSpec::new("note", FieldKind::Text),
            ],
        )
        .unwrap();
        let mut answers = Answers::default();
        answers.set("age", "30");
        answers.set("name", "Ada");

        let event = SubmissionEvent::capture(&template, &answers);
        assert_eq!(event.value("note"), Some(""));

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"Signup","data":{"name":"Ada","age":"30","note":""}}"#
        );
    }
}
