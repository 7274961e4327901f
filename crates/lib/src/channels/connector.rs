//! Channel connector: posts reply activities back to the channel's service URL.

use crate::channels::activity::{Activity, ConversationReference};
use crate::channels::sink::{ChannelError, ChannelSink};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    #[serde(default)]
    id: Option<String>,
}

/// HTTP client for the channel's `/v3/conversations/{id}/activities` API.
#[derive(Clone)]
pub struct ConnectorClient {
    token: Option<String>,
    client: reqwest::Client,
}

impl ConnectorClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            client: crate::http::client(crate::http::REQUEST_TIMEOUT),
        }
    }

    /// Bind this client to one conversation.
    pub fn sink(&self, reference: ConversationReference) -> ConnectorSink {
        ConnectorSink {
            connector: self.clone(),
            reference,
        }
    }

    /// POST one activity into `reference`'s conversation, as a reply when the reference carries an activity id.
    /// Returns the id the channel assigned, if any.
    pub async fn send_activity(
        &self,
        reference: &ConversationReference,
        activity: &Activity,
    ) -> Result<Option<String>, ChannelError> {
        let url = activities_url(reference)?;
        let mut req = self.client.post(url).json(activity);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!(
                "send activity failed: {} {}",
                status, body
            )));
        }
        let data: ResourceResponse = res.json().await.unwrap_or(ResourceResponse { id: None });
        Ok(data.id)
    }
}

/// `{serviceUrl}/v3/conversations/{conversationId}/activities[/{replyToId}]`, with ids percent-encoded.
fn activities_url(reference: &ConversationReference) -> Result<Url, ChannelError> {
    let base = reference
        .service_url
        .as_deref()
        .ok_or_else(|| ChannelError::ServiceUrl("activity carried no serviceUrl".to_string()))?;
    let mut url = Url::parse(base).map_err(|e| ChannelError::ServiceUrl(format!("{}: {}", base, e)))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ChannelError::ServiceUrl(base.to_string()))?;
        segments.pop_if_empty();
        segments.extend(["v3", "conversations", reference.conversation.id.as_str(), "activities"]);
        if let Some(ref reply_to) = reference.activity_id {
            segments.push(reply_to);
        }
    }
    Ok(url)
}

/// [`ChannelSink`] that addresses every activity to one conversation.
#[derive(Clone)]
pub struct ConnectorSink {
    connector: ConnectorClient,
    reference: ConversationReference,
}

impl ConnectorSink {
    fn address(&self, mut activity: Activity) -> Activity {
        activity.conversation = self.reference.conversation.clone();
        activity.channel_id = self.reference.channel_id.clone();
        activity.service_url = self.reference.service_url.clone();
        activity.from = self.reference.bot.clone();
        activity.recipient = self.reference.user.clone();
        activity.reply_to_id = self.reference.activity_id.clone();
        if activity.locale.is_none() {
            activity.locale = self.reference.locale.clone();
        }
        activity
    }
}

#[async_trait]
impl ChannelSink for ConnectorSink {
    async fn send_activities(&self, activities: Vec<Activity>) -> Result<(), ChannelError> {
        for activity in activities {
            let activity = self.address(activity);
            self.connector.send_activity(&self.reference, &activity).await?;
        }
        Ok(())
    }
}
