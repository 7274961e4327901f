//! Relay sessions: one agent conversation per channel conversation.
//!
//! The store maps the channel's conversation id to a [`RelaySession`]. Creation opens an agent
//! conversation upstream, so it is serialized per key: concurrent first contacts for the same id
//! share a single open, while other ids are unaffected.

use crate::directline::{AgentError, AgentService, SessionToken, Watermark};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, RwLock};

/// Channel-side conversation id (opaque string).
pub type ConversationId = String;

/// Mapping from one channel conversation to its agent conversation plus the read cursor.
#[derive(Debug)]
pub struct RelaySession {
    pub external_conversation_id: ConversationId,
    pub agent_conversation_id: String,
    token: SessionToken,
    watermark: Mutex<Watermark>,
    last_activity: Mutex<DateTime<Utc>>,
}

impl RelaySession {
    pub fn new(
        external_conversation_id: impl Into<ConversationId>,
        agent_conversation_id: impl Into<String>,
        token: SessionToken,
    ) -> Self {
        Self {
            external_conversation_id: external_conversation_id.into(),
            agent_conversation_id: agent_conversation_id.into(),
            token,
            watermark: Mutex::new(Watermark::default()),
            last_activity: Mutex::new(Utc::now()),
        }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Current read position in the agent log.
    pub async fn watermark(&self) -> Watermark {
        self.watermark.lock().await.clone()
    }

    /// Move the watermark to `next` only if it is strictly after the current one.
    /// Returns false (and leaves the session untouched) otherwise.
    pub async fn advance_watermark(&self, next: &Watermark) -> bool {
        let mut current = self.watermark.lock().await;
        if !next.is_after(&current) {
            return false;
        }
        *current = next.clone();
        true
    }

    pub async fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock().await
    }

    pub async fn touch(&self) {
        *self.last_activity.lock().await = Utc::now();
    }
}

/// Result of [`SessionStore::get_or_create`].
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Arc<RelaySession>,
    /// True only for the call that opened the agent conversation.
    pub created: bool,
}

type Slot = Arc<OnceCell<Arc<RelaySession>>>;

/// In-memory store of relay sessions, keyed by channel conversation id.
pub struct SessionStore {
    inner: RwLock<HashMap<ConversationId, Slot>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    async fn slot(&self, id: &str) -> Slot {
        if let Some(slot) = self.inner.read().await.get(id) {
            return slot.clone();
        }
        self.inner
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Return the session for `id`, opening an agent conversation through `agent` if there is none.
    /// A failed open leaves nothing behind; the next call tries again.
    pub async fn get_or_create(
        &self,
        id: &str,
        agent: &dyn AgentService,
    ) -> Result<ResolvedSession, AgentError> {
        let slot = self.slot(id).await;
        let mut created = false;
        let created_flag = &mut created;
        let session = slot
            .get_or_try_init(|| async move {
                let conversation = agent.open_conversation().await?;
                log::info!(
                    "session: conversation {} mapped to agent conversation {}",
                    id,
                    conversation.conversation_id
                );
                *created_flag = true;
                Ok::<_, AgentError>(Arc::new(RelaySession::new(
                    id,
                    conversation.conversation_id,
                    conversation.token,
                )))
            })
            .await?
            .clone();
        Ok(ResolvedSession { session, created })
    }

    /// Return the session if one has been created for `id`.
    pub async fn get(&self, id: &str) -> Option<Arc<RelaySession>> {
        let slot = self.inner.read().await.get(id).cloned()?;
        slot.get().cloned()
    }

    /// Record activity on the session now. Returns false if no session exists for `id`.
    pub async fn touch(&self, id: &str) -> bool {
        match self.get(id).await {
            Some(session) => {
                session.touch().await;
                true
            }
            None => false,
        }
    }

    /// Number of established sessions.
    pub async fn len(&self) -> usize {
        self.inner
            .read()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
