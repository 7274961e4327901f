//! Reply polling: read the agent's activity log from the session watermark until replies show up.
//!
//! A poll is a finite stream of [`ReplyBatch`]es. Each attempt reads everything after the current
//! watermark and keeps only messages authored by the agent. A batch is yielded only after the
//! session watermark has been moved forward to the batch's position; if that position is not
//! strictly after the current watermark, a newer turn has already consumed the log and this poll
//! stops without yielding.
//!
//! Polls never hold a session lock across a read or a sleep: the watermark is read, the log is
//! fetched, then the watermark is compare-and-set.
//!
//! The deadline is wall-clock time from the first poll of the stream. A read still in flight when
//! it passes is abandoned and the stream ends, so a slow agent cannot stretch a turn.

use crate::config::Config;
use crate::directline::{AgentActivity, AgentError, AgentService, Watermark};
use crate::session::RelaySession;
use futures_util::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Agent replies read in one attempt, in log order.
#[derive(Debug, Clone)]
pub struct ReplyBatch {
    pub watermark: Watermark,
    pub replies: Vec<AgentActivity>,
}

/// Outcome of a single read of the activity log.
#[derive(Debug)]
enum PollStep {
    /// Nothing from the agent yet; keep waiting.
    Empty,
    /// Log position did not advance past the session watermark; give up this poll.
    Stale,
    /// The read did not finish before the deadline.
    Expired,
    Fresh(ReplyBatch),
}

#[derive(Debug, Clone)]
pub struct ReplyPoller {
    interval: Duration,
    deadline: Duration,
    bot_name: String,
}

impl ReplyPoller {
    pub fn new(interval: Duration, deadline: Duration, bot_name: impl Into<String>) -> Self {
        Self {
            interval,
            deadline,
            bot_name: bot_name.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.relay.poll_interval(),
            config.relay.reply_deadline(),
            config.agent.bot_name.trim(),
        )
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Reads per poll: the deadline divided into intervals, at least one.
    pub fn attempts(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let n = self.deadline.as_millis() / interval;
        n.clamp(1, u32::MAX as u128) as u32
    }

    /// Poll `session`'s agent conversation for replies. Attempts are one interval apart; the stream
    /// ends when attempts run out, the deadline passes, a stale read is seen, or a read fails.
    pub fn poll_for_replies(
        &self,
        agent: Arc<dyn AgentService>,
        session: Arc<RelaySession>,
    ) -> impl Stream<Item = Result<ReplyBatch, AgentError>> + Send + 'static {
        let state = PollState {
            agent,
            session,
            bot_name: self.bot_name.clone(),
            interval: self.interval,
            deadline: self.deadline,
            deadline_at: None,
            remaining: self.attempts(),
            started: false,
            finished: false,
        };
        stream::unfold(state, |mut st| async move {
            let deadline = st.deadline;
            let deadline_at = *st.deadline_at.get_or_insert_with(|| Instant::now() + deadline);
            loop {
                if st.finished || st.remaining == 0 {
                    return None;
                }
                if st.started {
                    let left = deadline_at.saturating_duration_since(Instant::now());
                    tokio::time::sleep(st.interval.min(left)).await;
                }
                st.started = true;
                let left = deadline_at.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    log::debug!(
                        "poller: deadline reached for conversation {}",
                        st.session.external_conversation_id
                    );
                    return None;
                }
                st.remaining -= 1;

                match poll_once(st.agent.as_ref(), &st.session, &st.bot_name, left).await {
                    Ok(PollStep::Empty) => continue,
                    Ok(PollStep::Expired) => {
                        log::debug!(
                            "poller: read for conversation {} outlasted the deadline, stopping",
                            st.session.external_conversation_id
                        );
                        return None;
                    }
                    Ok(PollStep::Stale) => {
                        log::debug!(
                            "poller: conversation {} already advanced past this poll, stopping",
                            st.session.external_conversation_id
                        );
                        return None;
                    }
                    Ok(PollStep::Fresh(batch)) => return Some((Ok(batch), st)),
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }
        })
    }
}

struct PollState {
    agent: Arc<dyn AgentService>,
    session: Arc<RelaySession>,
    bot_name: String,
    interval: Duration,
    deadline: Duration,
    /// Fixed on the first poll of the stream.
    deadline_at: Option<Instant>,
    remaining: u32,
    started: bool,
    finished: bool,
}

async fn poll_once(
    agent: &dyn AgentService,
    session: &RelaySession,
    bot_name: &str,
    time_left: Duration,
) -> Result<PollStep, AgentError> {
    let current = session.watermark().await;
    let read = agent.get_activities(&session.agent_conversation_id, session.token(), &current);
    let batch = match tokio::time::timeout(time_left, read).await {
        Ok(batch) => batch?,
        Err(_) => return Ok(PollStep::Expired),
    };
    let replies: Vec<AgentActivity> = batch
        .activities
        .into_iter()
        .filter(|a| a.is_message_from(bot_name))
        .collect();
    if replies.is_empty() {
        return Ok(PollStep::Empty);
    }
    if !session.advance_watermark(&batch.watermark).await {
        return Ok(PollStep::Stale);
    }
    log::debug!(
        "poller: {} repl{} for conversation {} at watermark {}",
        replies.len(),
        if replies.len() == 1 { "y" } else { "ies" },
        session.external_conversation_id,
        batch.watermark
    );
    Ok(PollStep::Fresh(ReplyBatch {
        watermark: batch.watermark,
        replies,
    }))
}
