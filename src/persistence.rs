//! Persistence of completed submissions
//!
//! Storage engines plug in as named [`Adaptor`]s. The engine only talks to
//! the [`Persistence`] façade, which is a no-op when persistence is
//! disabled and keeps blocking adaptor calls off the async workers.

mod sqlite;

pub use sqlite::SqliteAdaptor;

use crate::config::DatabaseConfig;
use crate::submission::SubmissionEvent;
use crate::template::FormTemplate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Unknown adaptor: {0}")]
    UnknownAdaptor(String),
    #[error("Adaptor already registered: {0}")]
    DuplicateAdaptor(String),
    #[error("Adaptor is not open")]
    NotOpen,
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid database config: {0}")]
    Config(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Persistence task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Persistence timed out after {0:?}")]
    Timeout(Duration),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateOutcome {
    Created,
    AlreadyExists,
    /// Persistence is disabled
    Skipped,
}

/// A storage engine for submissions
pub trait Adaptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Connect using the adaptor's section of the database config
    fn open(&self, config: &DatabaseConfig) -> PersistenceResult<()>;

    /// Create the form's table; a no-op if it already exists
    fn migrate(&self, template: &FormTemplate) -> PersistenceResult<MigrateOutcome>;

    fn insert(&self, template: &FormTemplate, event: &SubmissionEvent) -> PersistenceResult<()>;
}

/// Named adaptors selectable from configuration
#[derive(Default)]
pub struct AdaptorRegistry {
    adaptors: HashMap<String, Arc<dyn Adaptor>>,
}

impl AdaptorRegistry {
    /// Registry with every adaptor that ships with the crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        registry.adaptors.insert(
            "sqlite".to_string(),
            Arc::new(SqliteAdaptor::new()) as Arc<dyn Adaptor>,
        );
        registry
    }

    pub fn register(&mut self, adaptor: Arc<dyn Adaptor>) -> PersistenceResult<()> {
        let name = adaptor.name().to_string();
        if self.adaptors.contains_key(&name) {
            return Err(PersistenceError::DuplicateAdaptor(name));
        }
        self.adaptors.insert(name, adaptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> PersistenceResult<Arc<dyn Adaptor>> {
        self.adaptors
            .get(name)
            .cloned()
            .ok_or_else(|| {
                PersistenceError::UnknownAdaptor(format!(
                    "{name} (available: {})",
                    self.names().join(", ")
                ))
            })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adaptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Persistence as seen by the engine
#[derive(Clone)]
pub struct Persistence {
    adaptor: Option<Arc<dyn Adaptor>>,
    timeout: Duration,
}

impl Persistence {
    pub fn disabled() -> Self {
        Self {
            adaptor: None,
            timeout: Duration::ZERO,
        }
    }

    /// Use an already opened adaptor
    pub fn with_adaptor(adaptor: Arc<dyn Adaptor>, timeout: Duration) -> Self {
        Self {
            adaptor: Some(adaptor),
            timeout,
        }
    }

    /// Select and open the configured adaptor; disabled config gives a no-op
    pub fn open(config: &DatabaseConfig, registry: &AdaptorRegistry) -> PersistenceResult<Self> {
        if !config.enable {
            return Ok(Self::disabled());
        }
        let adaptor = registry.get(config.use_adaptor.trim())?;
        adaptor.open(config)?;
        tracing::info!(adaptor = adaptor.name(), "Persistence enabled");
        Ok(Self::with_adaptor(adaptor, config.persist_timeout()))
    }

    pub fn is_enabled(&self) -> bool {
        self.adaptor.is_some()
    }

    pub fn adaptor_name(&self) -> Option<&'static str> {
        self.adaptor.as_ref().map(|a| a.name())
    }

    pub fn migrate(&self, template: &FormTemplate) -> PersistenceResult<MigrateOutcome> {
        match &self.adaptor {
            Some(adaptor) => adaptor.migrate(template),
            None => Ok(MigrateOutcome::Skipped),
        }
    }

    /// Store a submission on the blocking pool, bounded by the timeout
    pub async fn insert(
        &self,
        template: Arc<FormTemplate>,
        event: SubmissionEvent,
    ) -> PersistenceResult<()> {
        let Some(adaptor) = self.adaptor.clone() else {
            return Ok(());
        };
        let task = tokio::task::spawn_blocking(move || adaptor.insert(&template, &event));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(PersistenceError::Timeout(self.timeout)),
        }
    }
}

/// The configured adaptor must match the storage dialect the form declares
pub fn check_target(config: &DatabaseConfig, template: &FormTemplate) -> PersistenceResult<()> {
    if !config.enable {
        return Ok(());
    }
    match template.dialect() {
        Some(dialect) if dialect.as_str() != config.use_adaptor.trim() => {
            Err(PersistenceError::Config(format!(
                "form '{}' targets {}, but database.use_adaptor is '{}'",
                template.form_name(),
                dialect.as_str(),
                config.use_adaptor
            )))
        }
        _ => Ok(()),
    }
}
