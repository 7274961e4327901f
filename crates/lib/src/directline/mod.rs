//! Agent session service: the hosted agent reached over Direct Line.
//!
//! The relay only needs three calls (open, post, read-since-watermark), expressed by
//! [`AgentService`] so the turn logic can run against the real client or an in-process fake.

mod client;
mod types;

pub use client::DirectLineClient;
pub use types::{
    ActivityBatch, AgentAccount, AgentActivity, AgentConversation, SessionToken, Watermark,
};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("direct line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("direct line api error: {0}")]
    Api(String),
    #[error("direct line not configured: {0}")]
    Config(String),
}

/// Operations the relay performs against the agent's conversation log.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Start a new agent-side conversation and return its id and session token.
    async fn open_conversation(&self) -> Result<AgentConversation, AgentError>;

    /// Append an activity (normally the end user's message) to the conversation.
    async fn post_activity(
        &self,
        conversation_id: &str,
        token: &SessionToken,
        activity: &AgentActivity,
    ) -> Result<(), AgentError>;

    /// Activities recorded after `watermark`, plus the log position they reach.
    async fn get_activities(
        &self,
        conversation_id: &str,
        token: &SessionToken,
        watermark: &Watermark,
    ) -> Result<ActivityBatch, AgentError>;
}
