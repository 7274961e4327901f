//! Direct Line 3.0 REST client.
//!
//! Opening a conversation authenticates with either a token fetched from a token endpoint or the
//! Direct Line secret; every later call uses the conversation's own token.

use super::types::{ActivityBatch, AgentActivity, AgentConversation, SessionToken, Watermark};
use super::{AgentError, AgentService};
use crate::config::{self, Config};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://directline.botframework.com/v3/directline";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    conversation_id: String,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivitySetResponse {
    #[serde(default)]
    activities: Vec<AgentActivity>,
    #[serde(default)]
    watermark: Option<String>,
}

/// Client for the Direct Line REST API.
#[derive(Clone)]
pub struct DirectLineClient {
    base_url: String,
    secret: Option<String>,
    token_endpoint: Option<String>,
    client: reqwest::Client,
}

impl DirectLineClient {
    pub fn new(
        base_url: Option<String>,
        secret: Option<String>,
        token_endpoint: Option<String>,
    ) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            secret,
            token_endpoint: token_endpoint.filter(|u| !u.trim().is_empty()),
            client: crate::http::client(crate::http::REQUEST_TIMEOUT),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Some(config.agent.direct_line_base_url.clone()),
            config::resolve_direct_line_secret(config),
            config.agent.token_endpoint.clone(),
        )
    }

    /// Bearer credential used to start a conversation.
    async fn start_credential(&self) -> Result<String, AgentError> {
        if let Some(ref endpoint) = self.token_endpoint {
            let res = self.client.get(endpoint).send().await?;
            let res = ensure_success(res, "token endpoint").await?;
            let data: TokenResponse = res.json().await?;
            return Ok(data.token);
        }
        self.secret
            .clone()
            .ok_or_else(|| AgentError::Config("set agent.secret or agent.tokenEndpoint".to_string()))
    }

    /// `{base}/conversations[/{segments}...]`, each segment percent-encoded.
    fn conversations_url(&self, segments: &[&str]) -> Result<Url, AgentError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AgentError::Config(format!("directLineBaseUrl {}: {}", self.base_url, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AgentError::Config(format!("directLineBaseUrl {}", self.base_url)))?;
            path.pop_if_empty();
            path.push("conversations");
            path.extend(segments);
        }
        Ok(url)
    }

    fn activities_url(&self, conversation_id: &str) -> Result<Url, AgentError> {
        self.conversations_url(&[conversation_id, "activities"])
    }
}

async fn ensure_success(
    res: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, AgentError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Err(AgentError::Api(format!("{} failed: {} {}", what, status, body)))
}

#[async_trait]
impl AgentService for DirectLineClient {
    /// POST /conversations
    async fn open_conversation(&self) -> Result<AgentConversation, AgentError> {
        let credential = self.start_credential().await?;
        let url = self.conversations_url(&[])?;
        let res = self
            .client
            .post(url)
            .bearer_auth(&credential)
            .send()
            .await?;
        let res = ensure_success(res, "start conversation").await?;
        let data: ConversationResponse = res.json().await?;
        log::debug!("direct line: opened conversation {}", data.conversation_id);
        Ok(AgentConversation {
            conversation_id: data.conversation_id,
            token: SessionToken::new(data.token.unwrap_or(credential)),
        })
    }

    /// POST /conversations/{id}/activities
    async fn post_activity(
        &self,
        conversation_id: &str,
        token: &SessionToken,
        activity: &AgentActivity,
    ) -> Result<(), AgentError> {
        let res = self
            .client
            .post(self.activities_url(conversation_id)?)
            .bearer_auth(token.expose())
            .json(activity)
            .send()
            .await?;
        ensure_success(res, "post activity").await?;
        Ok(())
    }

    /// GET /conversations/{id}/activities?watermark=
    async fn get_activities(
        &self,
        conversation_id: &str,
        token: &SessionToken,
        watermark: &Watermark,
    ) -> Result<ActivityBatch, AgentError> {
        let mut req = self
            .client
            .get(self.activities_url(conversation_id)?)
            .bearer_auth(token.expose());
        if !watermark.is_unset() {
            req = req.query(&[("watermark", watermark.as_str())]);
        }
        let res = ensure_success(req.send().await?, "get activities").await?;
        let data: ActivitySetResponse = res.json().await?;
        Ok(ActivityBatch {
            activities: data.activities,
            watermark: data.watermark.map(Watermark::new).unwrap_or_default(),
        })
    }
}
