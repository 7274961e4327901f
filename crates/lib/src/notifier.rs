//! Bootstrap notification: announce a newly seen channel conversation to an external endpoint.
//!
//! Delivery is best effort. The notifier runs on its own task; failures are logged and dropped.

use crate::channels::ConversationReference;
use crate::config::{self, Config};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notify request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("notify endpoint returned {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait BootstrapNotifier: Send + Sync {
    async fn notify(&self, reference: &ConversationReference) -> Result<(), NotifyError>;
}

/// Used when no endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl BootstrapNotifier for NoopNotifier {
    async fn notify(&self, reference: &ConversationReference) -> Result<(), NotifyError> {
        log::debug!(
            "notifier: no endpoint configured, skipping conversation {}",
            reference.conversation.id
        );
        Ok(())
    }
}

/// POSTs the conversation reference as JSON.
#[derive(Clone)]
pub struct HttpNotifier {
    url: String,
    authorization: Option<String>,
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, authorization: Option<String>) -> Self {
        Self {
            url: url.into(),
            authorization,
            client: crate::http::client(crate::http::REQUEST_TIMEOUT),
        }
    }
}

#[async_trait]
impl BootstrapNotifier for HttpNotifier {
    async fn notify(&self, reference: &ConversationReference) -> Result<(), NotifyError> {
        let mut req = self.client.post(&self.url).json(reference);
        if let Some(ref auth) = self.authorization {
            req = req.header(reqwest::header::AUTHORIZATION, auth);
        }
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        log::debug!(
            "notifier: announced conversation {} ({})",
            reference.conversation.id,
            status
        );
        Ok(())
    }
}

/// Build the notifier from config: HTTP when a URL is set, otherwise a no-op.
pub fn notifier_from_config(config: &Config) -> Arc<dyn BootstrapNotifier> {
    match config::resolve_notifier_url(config) {
        Some(url) => Arc::new(HttpNotifier::new(url, config.notifier.authorization.clone())),
        None => Arc::new(NoopNotifier),
    }
}

/// Run `notifier` for `reference` in the background. The caller does not wait for it.
pub fn spawn_notify(
    notifier: Arc<dyn BootstrapNotifier>,
    reference: ConversationReference,
) -> JoinHandle<()> {
    spawn_notify_within(notifier, reference, crate::http::REQUEST_TIMEOUT)
}

/// Like [`spawn_notify`], giving up once `limit` has passed.
pub fn spawn_notify_within(
    notifier: Arc<dyn BootstrapNotifier>,
    reference: ConversationReference,
    limit: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::time::timeout(limit, notifier.notify(&reference)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!(
                "notifier: announcing conversation {} failed: {}",
                reference.conversation.id,
                e
            ),
            Err(_) => log::warn!(
                "notifier: announcing conversation {} timed out after {:?}",
                reference.conversation.id,
                limit
            ),
        }
    })
}
