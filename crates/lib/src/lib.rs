//! Relay core library: bridges a chat channel's conversations to a hosted agent over Direct Line.
//!
//! Each channel conversation gets one agent conversation ([`session`]); user messages are forwarded
//! and agent replies are read back by polling the agent log from a watermark ([`poller`]), then
//! sent to the channel ([`relay`]).

pub mod channels;
pub mod config;
pub mod directline;
pub mod gateway;
pub mod http;
pub mod init;
pub mod notifier;
pub mod poller;
pub mod relay;
pub mod session;
pub mod translate;

#[cfg(test)]
mod test_support;
