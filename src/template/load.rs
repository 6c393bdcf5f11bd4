//! Loading and checking form definitions

use super::{
    column_type, Button, Dialect, FieldKind, FieldSpec, FormTemplate, Messages, Rules, TextFormat,
};
use crate::state_machine::event::is_reserved_action;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static BUTTON_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("button data regex is valid"));

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read form definition {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse form definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("form definition has {} problem(s): {}", .0.len(), .0.join("; "))]
    Invalid(Vec<String>),
}

impl TemplateError {
    /// Individual problems, one per line of output
    pub fn problems(&self) -> Vec<String> {
        match self {
            Self::Invalid(problems) => problems.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Form definition document as written by form authors
#[derive(Debug, Deserialize)]
struct FormDefinition {
    #[serde(default)]
    form_name: String,
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    review_enabled: bool,
    #[serde(default)]
    db: Option<String>,
    #[serde(default)]
    messages: Messages,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
}

#[derive(Debug, Deserialize)]
struct FieldDefinition {
    #[serde(default)]
    name: String,
    #[serde(default)]
    label: String,
    #[serde(rename = "type")]
    kind: FieldKind,
    #[serde(default)]
    db_type: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    skippable: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    formatting: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    buttons: Vec<Button>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    validation: Rules,
}

impl FormTemplate {
    /// Read, parse and check a form definition file.
    ///
    /// Media locations are resolved relative to the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&content, base_dir)
    }

    pub fn from_json(json: &str, base_dir: &Path) -> Result<Self, TemplateError> {
        let definition: FormDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition, base_dir)
    }

    /// Build a template in code; runs the same checks as [`FormTemplate::load`]
    pub fn new(
        form_name: impl Into<String>,
        table_name: impl Into<String>,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, TemplateError> {
        let template = Self {
            form_name: form_name.into(),
            table_name: table_name.into(),
            review_enabled: false,
            dialect: None,
            messages: Messages::default(),
            fields,
        };
        let problems = template.check();
        if problems.is_empty() {
            Ok(template)
        } else {
            Err(TemplateError::Invalid(problems))
        }
    }

    #[must_use]
    pub fn with_review(mut self, enabled: bool) -> Self {
        self.review_enabled = enabled;
        self
    }

    fn from_definition(definition: FormDefinition, base_dir: &Path) -> Result<Self, TemplateError> {
        let mut problems = Vec::new();

        let dialect = match definition.db.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(db) => match db.parse::<Dialect>() {
                Ok(dialect) => Some(dialect),
                Err(e) => {
                    problems.push(e);
                    None
                }
            },
        };

        let fields = definition
            .fields
            .into_iter()
            .map(|field| resolve_field(field, base_dir, dialect, &mut problems))
            .collect();

        let template = Self {
            form_name: definition.form_name,
            table_name: definition.table_name,
            review_enabled: definition.review_enabled,
            dialect,
            messages: definition.messages,
            fields,
        };

        problems.extend(template.check());
        if problems.is_empty() {
            Ok(template)
        } else {
            Err(TemplateError::Invalid(problems))
        }
    }

    /// Every problem with the template, in field order
    fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.form_name.trim().is_empty() {
            problems.push("form_name cannot be empty".to_string());
        }
        if self.table_name.trim().is_empty() {
            problems.push("table_name cannot be empty".to_string());
        } else if self.dialect.is_some() && !IDENTIFIER.is_match(&self.table_name) {
            problems.push(format!(
                "table_name '{}' must be a plain identifier",
                self.table_name
            ));
        }
        if self.fields.is_empty() {
            problems.push("form must define at least one field".to_string());
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                problems.push("every field needs a name".to_string());
            } else if !seen.insert(field.name.as_str()) {
                problems.push(format!("field name '{}' is used more than once", field.name));
            }
            check_field(field, self.dialect, &mut problems);
        }

        problems.extend(self.messages.placeholder_mismatches());
        problems
    }
}

fn resolve_field(
    definition: FieldDefinition,
    base_dir: &Path,
    dialect: Option<Dialect>,
    problems: &mut Vec<String>,
) -> FieldSpec {
    let FieldDefinition {
        name,
        label,
        kind,
        db_type,
        required,
        skippable,
        description,
        formatting,
        location,
        buttons,
        options,
        validation,
    } = definition;

    let format = match formatting.as_deref().map(str::trim) {
        None | Some("") => None,
        Some("Markdown") => Some(TextFormat::Markdown),
        Some("HTML") => Some(TextFormat::Html),
        Some(other) => {
            problems.push(format!(
                "field '{name}' has unknown formatting '{other}', expected Markdown or HTML"
            ));
            None
        }
    };

    let media = match location.as_deref().map(str::trim) {
        Some(location) if kind.is_media() && !location.is_empty() => {
            let path = base_dir.join(location);
            if !path.is_file() {
                problems.push(format!(
                    "field '{name}' has a missing media file: {location}"
                ));
            }
            Some(path)
        }
        _ => None,
    };

    let column = match (db_type.as_deref().map(str::trim), dialect) {
        (Some(declared), Some(dialect)) if !declared.is_empty() => {
            match column_type(dialect, declared) {
                Ok(column) => Some(column),
                Err(e) => {
                    problems.push(format!("DB validation failed for field '{name}': {e}"));
                    None
                }
            }
        }
        _ => None,
    };

    FieldSpec {
        label: if label.trim().is_empty() { name.clone() } else { label },
        name,
        kind,
        required,
        skippable,
        description,
        format,
        media,
        buttons,
        options,
        rules: validation,
        column,
    }
}

fn check_field(field: &FieldSpec, dialect: Option<Dialect>, problems: &mut Vec<String>) {
    let name = &field.name;

    if field.kind.is_media() && field.media.is_none() {
        problems.push(format!("field '{name}' location is empty"));
    }

    if dialect.is_some() && field.column.is_some() && !IDENTIFIER.is_match(name) {
        problems.push(format!(
            "field '{name}' is stored as a column and must be a plain identifier"
        ));
    }

    for button in &field.buttons {
        if button.text.is_empty() || button.data.is_empty() {
            problems.push(format!(
                "button in field '{name}' must have both text and data"
            ));
        } else if !BUTTON_DATA.is_match(&button.data) {
            problems.push(format!(
                "button data '{}' in field '{name}' contains invalid characters",
                button.data
            ));
        } else if is_reserved_action(&button.data) {
            problems.push(format!(
                "button data '{}' in field '{name}' collides with a built-in action",
                button.data
            ));
        }
    }

    if field.kind == FieldKind::Select {
        if field.options.is_empty() {
            problems.push(format!("select field '{name}' must have options"));
        }
        for button in &field.buttons {
            if !button.data.is_empty() && !field.options.contains(&button.data) {
                problems.push(format!(
                    "button data '{}' in select field '{name}' is not one of its options",
                    button.data
                ));
            }
        }
    }

    let rules = &field.rules;
    if let (Some(min), Some(max)) = (rules.min, rules.max) {
        if min > max {
            problems.push(format!("field '{name}' has invalid min/max constraints"));
        }
    }
    if rules.max_length > 0 && rules.min_length > rules.max_length {
        problems.push(format!(
            "field '{name}' has invalid min/max length constraints"
        ));
    }
    if let Some(pattern) = &rules.regex {
        if let Err(e) = Regex::new(pattern) {
            problems.push(format!(
                "field '{name}' has an invalid regex pattern: {e}"
            ));
        }
    }
}
