//! Form template
//!
//! The ordered field list, validation rules and UI texts of a form. A
//! template is validated once at load time and then shared read-only by
//! every session; answers never live here.

mod column;
mod field;
mod load;
mod messages;

pub use column::{column_type, Dialect};
pub use field::{Button, FieldKind, FieldSpec, Rules, TextFormat};
pub use load::TemplateError;
pub use messages::{MessageKey, Messages};

/// Immutable form definition
#[derive(Debug)]
pub struct FormTemplate {
    form_name: String,
    table_name: String,
    review_enabled: bool,
    dialect: Option<Dialect>,
    messages: Messages,
    fields: Vec<FieldSpec>,
}

impl FormTemplate {
    pub fn form_name(&self) -> &str {
        &self.form_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn review_enabled(&self) -> bool {
        self.review_enabled
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_at(&self, step: usize) -> Option<&FieldSpec> {
        self.fields.get(step)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that map to a storage column
    pub fn columns(&self) -> impl Iterator<Item = (&FieldSpec, &str)> {
        self.fields
            .iter()
            .filter_map(|f| f.column.as_deref().map(|column| (f, column)))
    }
}
