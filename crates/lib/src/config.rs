//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Secrets (Direct Line secret, connector token) may be supplied through env instead of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent session service (Direct Line) settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Reply polling settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Bootstrap notification endpoint.
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Outbound channel connector settings.
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the inbound activity endpoint (default 3978).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3978
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Direct Line agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Direct Line REST base, up to and including `/v3/directline`.
    #[serde(default = "default_direct_line_base_url")]
    pub direct_line_base_url: String,

    /// Direct Line secret. Overridden by RELAY_DIRECT_LINE_SECRET env.
    pub secret: Option<String>,

    /// Token endpoint that hands out a Direct Line token (used instead of a secret when set).
    pub token_endpoint: Option<String>,

    /// Display name the agent uses as `from.name` on its replies. Replies from any other author are ignored.
    #[serde(default)]
    pub bot_name: String,
}

fn default_direct_line_base_url() -> String {
    "https://directline.botframework.com/v3/directline".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            direct_line_base_url: default_direct_line_base_url(),
            secret: None,
            token_endpoint: None,
            bot_name: String::new(),
        }
    }
}

/// Reply poll timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Delay between two polls of the agent activity log (default 1000 ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Total time a turn waits for agent replies (default 5000 ms).
    #[serde(default = "default_reply_deadline_ms")]
    pub reply_deadline_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_reply_deadline_ms() -> u64 {
    5000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            reply_deadline_ms: default_reply_deadline_ms(),
        }
    }
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn reply_deadline(&self) -> Duration {
        Duration::from_millis(self.reply_deadline_ms)
    }
}

/// Bootstrap notifier endpoint. When `url` is unset, new conversations are not announced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierConfig {
    /// HTTP POST target. Overridden by RELAY_NOTIFIER_URL env.
    pub url: Option<String>,
    /// Value sent as the Authorization header, if the endpoint needs one.
    pub authorization: Option<String>,
}

/// Channel connector config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Bearer token for outbound connector calls. Overridden by RELAY_CONNECTOR_TOKEN env.
    pub connector_token: Option<String>,
}

/// Env var value, trimmed; empty counts as unset.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the Direct Line secret: env RELAY_DIRECT_LINE_SECRET overrides config.
pub fn resolve_direct_line_secret(config: &Config) -> Option<String> {
    env_non_empty("RELAY_DIRECT_LINE_SECRET").or_else(|| trimmed(config.agent.secret.as_ref()))
}

/// Resolve the notifier URL: env RELAY_NOTIFIER_URL overrides config.
pub fn resolve_notifier_url(config: &Config) -> Option<String> {
    env_non_empty("RELAY_NOTIFIER_URL").or_else(|| trimmed(config.notifier.url.as_ref()))
}

/// Resolve the outbound connector token: env RELAY_CONNECTOR_TOKEN overrides config.
pub fn resolve_connector_token(config: &Config) -> Option<String> {
    env_non_empty("RELAY_CONNECTOR_TOKEN")
        .or_else(|| trimmed(config.channel.connector_token.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, RELAY_CONFIG_PATH, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
