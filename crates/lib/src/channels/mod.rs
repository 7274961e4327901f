//! The external chat channel.
//!
//! Inbound events arrive as Bot Framework style activities; replies go back out through a
//! [`ChannelSink`] bound to the conversation the event came from.

mod activity;
mod connector;
mod sink;

pub use activity::{Activity, ChannelAccount, ConversationAccount, ConversationReference};
pub use connector::{ConnectorClient, ConnectorSink};
pub use sink::{ChannelError, ChannelSink};
