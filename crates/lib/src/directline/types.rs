//! Direct Line wire types and the watermark cursor.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Account on the agent side (`from` of a Direct Line activity).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// "user" for end users, "bot" for the agent. Not every service fills it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A Direct Line activity (subset the relay reads or writes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentActivity {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<AgentAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl AgentActivity {
    pub const MESSAGE: &'static str = "message";

    /// A plain message activity with the given author and text.
    pub fn message(from: AgentAccount, text: impl Into<String>) -> Self {
        Self {
            typ: Self::MESSAGE.to_string(),
            from: Some(from),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_message(&self) -> bool {
        self.typ == Self::MESSAGE
    }

    /// True when this is a message whose author display name is exactly `name`.
    pub fn is_message_from(&self, name: &str) -> bool {
        self.is_message()
            && self
                .from
                .as_ref()
                .and_then(|f| f.name.as_deref())
                .is_some_and(|n| n == name)
    }
}

/// Opaque credential bound to one agent conversation. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// A freshly opened agent conversation.
#[derive(Debug, Clone)]
pub struct AgentConversation {
    pub conversation_id: String,
    pub token: SessionToken,
}

/// Cursor into an agent conversation's activity log.
///
/// The raw token is kept verbatim (it is sent back to the service as-is); ordering uses its
/// integer value, with an empty or non-numeric token ranking lowest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Watermark(String);

impl Watermark {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Numeric log position; 0 when unset or not a number.
    pub fn position(&self) -> u64 {
        self.0.trim().parse().unwrap_or(0)
    }

    /// Strictly later than `other`.
    pub fn is_after(&self, other: &Watermark) -> bool {
        self.cmp_position(other) == Ordering::Greater
    }

    pub fn cmp_position(&self, other: &Watermark) -> Ordering {
        self.position().cmp(&other.position())
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Watermark {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One read of the activity log: activities after the requested watermark and the position reached.
#[derive(Debug, Clone, Default)]
pub struct ActivityBatch {
    pub activities: Vec<AgentActivity>,
    pub watermark: Watermark,
}
