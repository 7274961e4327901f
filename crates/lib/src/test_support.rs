//! In-process fakes shared by the unit tests.

use crate::channels::{Activity, ChannelError, ChannelSink, ConversationReference};
use crate::directline::{
    ActivityBatch, AgentAccount, AgentActivity, AgentConversation, AgentError, AgentService,
    SessionToken, Watermark,
};
use crate::notifier::{BootstrapNotifier, NotifyError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub const BOT_NAME: &str = "Contoso Agent";

pub fn bot_reply(text: &str) -> AgentActivity {
    AgentActivity::message(
        AgentAccount {
            id: "agent-bot".to_string(),
            name: Some(BOT_NAME.to_string()),
            role: Some("bot".to_string()),
        },
        text,
    )
}

pub fn user_echo(text: &str) -> AgentActivity {
    AgentActivity::message(
        AgentAccount {
            id: "u1".to_string(),
            name: Some("Ada".to_string()),
            role: Some("user".to_string()),
        },
        text,
    )
}

pub fn batch(watermark: &str, activities: Vec<AgentActivity>) -> ActivityBatch {
    ActivityBatch {
        activities,
        watermark: Watermark::from(watermark),
    }
}

/// Agent service with scripted activity reads. When the script runs dry, reads return nothing new.
pub struct FakeAgent {
    conversation_id: String,
    open_delay: Duration,
    read_delay: Duration,
    opened: AtomicUsize,
    fail_next_open: AtomicBool,
    fail_post: AtomicBool,
    fail_get: AtomicBool,
    script: Mutex<VecDeque<ActivityBatch>>,
    posted: Mutex<Vec<(String, AgentActivity)>>,
    reads: Mutex<Vec<Watermark>>,
}

impl FakeAgent {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            open_delay: Duration::ZERO,
            read_delay: Duration::ZERO,
            opened: AtomicUsize::new(0),
            fail_next_open: AtomicBool::new(false),
            fail_post: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
            posted: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Every read takes `delay` before answering.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn push(&self, batch: ActivityBatch) {
        self.script.lock().unwrap().push_back(batch);
    }

    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    pub fn fail_posts(&self) {
        self.fail_post.store(true, Ordering::SeqCst);
    }

    pub fn fail_reads(&self) {
        self.fail_get.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn posted(&self) -> Vec<(String, AgentActivity)> {
        self.posted.lock().unwrap().clone()
    }

    /// Watermarks passed to each read, in call order.
    pub fn reads(&self) -> Vec<Watermark> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentService for FakeAgent {
    async fn open_conversation(&self) -> Result<AgentConversation, AgentError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(AgentError::Api("open refused".to_string()));
        }
        let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let conversation_id = if n == 1 {
            self.conversation_id.clone()
        } else {
            format!("{}-{}", self.conversation_id, n)
        };
        Ok(AgentConversation {
            conversation_id,
            token: SessionToken::new(format!("token-{}", n)),
        })
    }

    async fn post_activity(
        &self,
        conversation_id: &str,
        _token: &SessionToken,
        activity: &AgentActivity,
    ) -> Result<(), AgentError> {
        if self.fail_post.load(Ordering::SeqCst) {
            return Err(AgentError::Api("post refused".to_string()));
        }
        self.posted
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), activity.clone()));
        Ok(())
    }

    async fn get_activities(
        &self,
        _conversation_id: &str,
        _token: &SessionToken,
        watermark: &Watermark,
    ) -> Result<ActivityBatch, AgentError> {
        self.reads.lock().unwrap().push(watermark.clone());
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(AgentError::Api("read refused".to_string()));
        }
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| ActivityBatch {
            activities: Vec::new(),
            watermark: watermark.clone(),
        }))
    }
}

/// Channel sink that records what it was asked to send.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Activity>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.text.clone().unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl ChannelSink for RecordingSink {
    async fn send_activities(&self, activities: Vec<Activity>) -> Result<(), ChannelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Api("channel down".to_string()));
        }
        self.sent.lock().unwrap().extend(activities);
        Ok(())
    }
}

/// Notifier that forwards every reference it receives to a channel.
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<ConversationReference>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConversationReference>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl BootstrapNotifier for RecordingNotifier {
    async fn notify(&self, reference: &ConversationReference) -> Result<(), NotifyError> {
        let _ = self.tx.send(reference.clone());
        Ok(())
    }
}
