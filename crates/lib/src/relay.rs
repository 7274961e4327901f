//! Turn coordination: resolve the relay session, forward the user's message, drain agent replies
//! back to the channel, and stamp the session.

use crate::channels::{Activity, ChannelError, ChannelSink};
use crate::config::Config;
use crate::directline::{AgentAccount, AgentActivity, AgentError, AgentService, DirectLineClient};
use crate::notifier::{self, BootstrapNotifier};
use crate::poller::ReplyPoller;
use crate::session::{RelaySession, SessionStore};
use crate::translate::{DefaultTranslator, ResponseTranslator};
use futures_util::{pin_mut, StreamExt};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("activity has no conversation id")]
    MissingConversation,
    #[error("resolving agent session: {0}")]
    Session(#[source] AgentError),
    #[error("forwarding user message: {0}")]
    Forward(#[source] AgentError),
    #[error("reading agent replies: {0}")]
    Poll(#[source] AgentError),
    #[error("sending replies to channel: {0}")]
    Send(#[from] ChannelError),
}

/// What a completed turn relayed.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session: Arc<RelaySession>,
    /// Reply batches drained from the poller.
    pub batches: usize,
    /// Channel activities sent.
    pub replies_sent: usize,
}

/// Relays channel conversations to the agent.
pub struct RelayBot {
    store: Arc<SessionStore>,
    agent: Arc<dyn AgentService>,
    poller: ReplyPoller,
    translator: Arc<dyn ResponseTranslator>,
    notifier: Arc<dyn BootstrapNotifier>,
}

impl RelayBot {
    pub fn new(
        store: Arc<SessionStore>,
        agent: Arc<dyn AgentService>,
        poller: ReplyPoller,
        translator: Arc<dyn ResponseTranslator>,
        notifier: Arc<dyn BootstrapNotifier>,
    ) -> Self {
        Self {
            store,
            agent,
            poller,
            translator,
            notifier,
        }
    }

    /// Direct Line agent, default translator, notifier from config, empty store.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(SessionStore::new()),
            Arc::new(DirectLineClient::from_config(config)),
            ReplyPoller::from_config(config),
            Arc::new(DefaultTranslator),
            notifier::notifier_from_config(config),
        )
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Get or create the session for the activity's conversation. A newly created session is
    /// announced through the notifier in the background.
    async fn resolve(&self, activity: &Activity) -> Result<Arc<RelaySession>, RelayError> {
        let id = activity.conversation.id.as_str();
        if id.trim().is_empty() {
            return Err(RelayError::MissingConversation);
        }
        let resolved = self
            .store
            .get_or_create(id, self.agent.as_ref())
            .await
            .map_err(RelayError::Session)?;
        if resolved.created {
            notifier::spawn_notify(self.notifier.clone(), activity.conversation_reference());
        }
        Ok(resolved.session)
    }

    /// Conversation-update event: make sure the conversation has an agent session.
    pub async fn on_conversation_update(
        &self,
        activity: &Activity,
    ) -> Result<Arc<RelaySession>, RelayError> {
        self.resolve(activity).await
    }

    /// Message event: run one turn and send the agent's replies to `sink`.
    /// If the agent stays silent until the poll deadline, nothing is sent.
    pub async fn on_message(
        &self,
        activity: &Activity,
        sink: &dyn ChannelSink,
    ) -> Result<TurnOutcome, RelayError> {
        let session = self.resolve(activity).await?;

        self.agent
            .post_activity(
                &session.agent_conversation_id,
                session.token(),
                &user_message(activity),
            )
            .await
            .map_err(RelayError::Forward)?;

        let replies = self
            .poller
            .poll_for_replies(self.agent.clone(), session.clone());
        pin_mut!(replies);
        let mut batches = 0;
        let mut replies_sent = 0;
        while let Some(batch) = replies.next().await {
            let batch = batch.map_err(RelayError::Poll)?;
            let outbound = self.translator.translate(&batch.replies);
            batches += 1;
            replies_sent += outbound.len();
            sink.send_activities(outbound).await?;
        }

        self.store.touch(&session.external_conversation_id).await;
        if replies_sent == 0 {
            log::debug!(
                "relay: no agent reply for conversation {} within the deadline",
                session.external_conversation_id
            );
        }
        Ok(TurnOutcome {
            session,
            batches,
            replies_sent,
        })
    }
}

/// The channel message as an agent activity authored by the end user.
fn user_message(activity: &Activity) -> AgentActivity {
    let from = activity.from.clone().unwrap_or_default();
    AgentActivity {
        typ: AgentActivity::MESSAGE.to_string(),
        from: Some(AgentAccount {
            id: from.id,
            name: from.name,
            role: Some("user".to_string()),
        }),
        text: activity.text.clone(),
        text_format: activity.text_format.clone(),
        locale: activity.locale.clone(),
        attachments: activity.attachments.clone(),
        ..AgentActivity::default()
    }
}
