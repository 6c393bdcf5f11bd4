//! SQLite adaptor

use super::{Adaptor, MigrateOutcome, PersistenceError, PersistenceResult};
use crate::config::DatabaseConfig;
use crate::submission::SubmissionEvent;
use crate::template::{Dialect, FormTemplate};
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stores each submission as a row of the form's table
pub struct SqliteAdaptor {
    conn: Mutex<Option<Connection>>,
}

impl Default for SqliteAdaptor {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteAdaptor {
    pub fn new() -> Self {
        Self {
            conn: Mutex::new(None),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> PersistenceResult<T>,
    ) -> PersistenceResult<T> {
        let guard = self.conn();
        let conn = guard.as_ref().ok_or(PersistenceError::NotOpen)?;
        f(conn)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn check_dialect(template: &FormTemplate) -> PersistenceResult<()> {
    match template.dialect() {
        None | Some(Dialect::Sqlite) => Ok(()),
        Some(other) => Err(PersistenceError::Schema(format!(
            "form '{}' targets {other}, not sqlite",
            template.form_name()
        ))),
    }
}

fn table_exists(conn: &Connection, table: &str) -> PersistenceResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

impl Adaptor for SqliteAdaptor {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open(&self, config: &DatabaseConfig) -> PersistenceResult<()> {
        let path = &config.sqlite.path;
        if path.as_os_str().is_empty() {
            return Err(PersistenceError::Config(
                "database.sqlite.path must be set".to_string(),
            ));
        }
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        *self.conn() = Some(conn);
        tracing::info!(path = %path.display(), "Opened SQLite database");
        Ok(())
    }

    fn migrate(&self, template: &FormTemplate) -> PersistenceResult<MigrateOutcome> {
        check_dialect(template)?;
        self.with_conn(|conn| {
            let table = template.table_name();
            if table_exists(conn, table)? {
                tracing::info!(table, "Table already exists, skipping migration");
                return Ok(MigrateOutcome::AlreadyExists);
            }

            let mut sql = format!(
                "CREATE TABLE {} (\n  id TEXT PRIMARY KEY,\n  created_at TEXT NOT NULL",
                quote(table)
            );
            for (field, column) in template.columns() {
                let _ = write!(sql, ",\n  {} {column}", quote(&field.name));
                if field.required {
                    sql.push_str(" NOT NULL");
                }
            }
            sql.push_str("\n)");

            conn.execute_batch(&sql)?;
            tracing::info!(table, "Created table");
            Ok(MigrateOutcome::Created)
        })
    }

    fn insert(&self, template: &FormTemplate, event: &SubmissionEvent) -> PersistenceResult<()> {
        check_dialect(template)?;
        let mut columns = vec![quote("id"), quote("created_at")];
        let mut values: Vec<Option<String>> = vec![
            Some(uuid::Uuid::new_v4().to_string()),
            Some(Utc::now().to_rfc3339()),
        ];
        for (field, _) in template.columns() {
            let value = event.value(&field.name).unwrap_or_default();
            columns.push(quote(&field.name));
            values.push(if value.is_empty() && !field.required {
                None
            } else {
                Some(value.to_string())
            });
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(template.table_name()),
            columns.join(", "),
            placeholders.join(", ")
        );

        self.with_conn(|conn| {
            conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(())
        })
    }
}
