//! Outbound seam: where a turn's translated replies are delivered.

use crate::channels::activity::Activity;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
    #[error("invalid service url: {0}")]
    ServiceUrl(String),
}

/// Sends activities to one channel conversation.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    /// Deliver `activities` in order. Stops at the first failure.
    async fn send_activities(&self, activities: Vec<Activity>) -> Result<(), ChannelError>;
}
