//! Delivery of submissions to an external endpoint

use crate::config::{AuthConfig, AuthKind, WebhookConfig};
use crate::submission::SubmissionEvent;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Endpoint answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Receiver of completed submissions
#[async_trait]
pub trait Notifier: Send + Sync {
    /// One delivery attempt; failures are not retried
    async fn deliver(&self, event: &SubmissionEvent) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn deliver(&self, event: &SubmissionEvent) -> Result<(), DeliveryError> {
        (**self).deliver(event).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAuth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

impl From<&AuthConfig> for WebhookAuth {
    fn from(auth: &AuthConfig) -> Self {
        match auth.kind {
            AuthKind::None => Self::None,
            AuthKind::Bearer => Self::Bearer(auth.token.clone()),
            AuthKind::Basic => Self::Basic {
                username: auth.username.clone(),
                password: auth.password.clone(),
            },
        }
    }
}

/// Posts `{"event": ..., "data": {...}}` as JSON
pub struct WebhookNotifier {
    client: Client,
    url: String,
    auth: WebhookAuth,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            auth: WebhookAuth::from(&config.auth),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, event: &SubmissionEvent) -> Result<(), DeliveryError> {
        let request = self.client.post(&self.url).json(event);
        let request = match &self.auth {
            WebhookAuth::None => request,
            WebhookAuth::Bearer(token) => request.bearer_auth(token),
            WebhookAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
