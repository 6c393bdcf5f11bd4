//! Process configuration
//!
//! A YAML document covering the session timeout, the HTTP listener,
//! persistence and webhook delivery.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_session_timeout() -> u64 {
    1800
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug_mode: false,
            session_timeout_secs: default_session_timeout(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl Config {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub enable: bool,
    /// Name of a registered persistence adaptor, e.g. `sqlite`
    #[serde(default)]
    pub use_adaptor: String,
    #[serde(default = "default_persist_timeout")]
    pub persist_timeout_secs: u64,
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

fn default_persist_timeout() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enable: false,
            use_adaptor: String::new(),
            persist_timeout_secs: default_persist_timeout(),
            sqlite: SqliteConfig::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqliteConfig {
    /// Database file; `:memory:` for a private in-memory database
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFullPolicy {
    /// Wait for room in the queue
    #[default]
    Block,
    /// Drop the event and log it
    Drop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_workers")]
    pub workers_count: usize,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default)]
    pub on_full: QueueFullPolicy,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_workers() -> usize {
    4
}

fn default_queue_size() -> usize {
    100
}

fn default_webhook_timeout() -> u64 {
    10
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            auth: AuthConfig::default(),
            workers_count: default_workers(),
            queue_size: default_queue_size(),
            on_full: QueueFullPolicy::default(),
            timeout_secs: default_webhook_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    #[default]
    None,
    Bearer,
    Basic,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type", default)]
    pub kind: AuthKind,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Load and validate configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.session_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "session_timeout_secs must be > 0".to_string(),
        ));
    }

    let database = &config.database;
    if database.enable && database.use_adaptor.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "database.use_adaptor must be set when the database is enabled".to_string(),
        ));
    }
    if database.persist_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "database.persist_timeout_secs must be > 0".to_string(),
        ));
    }

    let webhook = &config.webhook;
    if webhook.timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "webhook.timeout_secs must be > 0".to_string(),
        ));
    }
    if webhook.enabled {
        if webhook.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "webhook.url must be set when the webhook is enabled".to_string(),
            ));
        }
        if webhook.workers_count == 0 {
            return Err(ConfigError::Invalid(
                "webhook.workers_count must be > 0".to_string(),
            ));
        }
        if webhook.queue_size == 0 {
            return Err(ConfigError::Invalid(
                "webhook.queue_size must be > 0".to_string(),
            ));
        }
        match webhook.auth.kind {
            AuthKind::Bearer if webhook.auth.token.is_empty() => {
                return Err(ConfigError::Invalid(
                    "webhook.auth.token is required for bearer auth".to_string(),
                ));
            }
            AuthKind::Basic if webhook.auth.username.is_empty() => {
                return Err(ConfigError::Invalid(
                    "webhook.auth.username is required for basic auth".to_string(),
                ));
            }
            _ => {}
        }
    }

    Ok(())
}
