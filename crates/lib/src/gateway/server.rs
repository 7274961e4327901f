//! Gateway HTTP server: health probe plus the inbound activity endpoint.

use crate::channels::{Activity, ConnectorClient};
use crate::config::{self, Config};
use crate::relay::RelayBot;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

const PROTOCOL_VERSION: u32 = 1;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub bot: Arc<RelayBot>,
    /// Delivers replies back to the conversation an activity came from.
    pub connector: ConnectorClient,
}

impl GatewayState {
    pub fn from_config(config: Config) -> Self {
        let connector = ConnectorClient::new(config::resolve_connector_token(&config));
        let bot = Arc::new(RelayBot::from_config(&config));
        Self {
            config: Arc::new(config),
            bot,
            connector,
        }
    }
}

/// Routes: `GET /` health, `POST /api/messages` inbound channel activities.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/api/messages", post(messages))
        .with_state(state)
}

/// Run the gateway; binds to config.gateway.bind:config.gateway.port and blocks until shutdown (Ctrl+C / SIGTERM).
/// Fails fast when `agent.botName` is empty, since no reply could ever be matched.
pub async fn run_gateway(config: Config) -> Result<()> {
    if config.agent.bot_name.trim().is_empty() {
        anyhow::bail!("agent.botName is not set; replies from the agent cannot be recognized");
    }
    if config::resolve_notifier_url(&config).is_none() {
        log::info!("no notifier endpoint configured; new conversations will not be announced");
    }
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState::from_config(config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /api/messages: accepts a channel activity and handles it on its own task.
/// Returns 202 right away; turn failures are logged, not reported to the caller.
async fn messages(State(state): State<GatewayState>, body: Bytes) -> StatusCode {
    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(a) => a,
        Err(_) => return StatusCode::BAD_REQUEST,
    };
    if activity.conversation.id.trim().is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    let bot = state.bot.clone();
    let kind = activity.typ.clone();
    match kind.as_str() {
        Activity::CONVERSATION_UPDATE => {
            tokio::spawn(async move {
                if let Err(e) = bot.on_conversation_update(&activity).await {
                    log::warn!(
                        "conversation update for {} failed: {}",
                        activity.conversation.id,
                        e
                    );
                }
            });
        }
        Activity::MESSAGE => {
            let sink = state.connector.sink(activity.conversation_reference());
            tokio::spawn(async move {
                match bot.on_message(&activity, &sink).await {
                    Ok(outcome) => log::debug!(
                        "turn for {} relayed {} repl{}",
                        activity.conversation.id,
                        outcome.replies_sent,
                        if outcome.replies_sent == 1 { "y" } else { "ies" }
                    ),
                    Err(e) => log::warn!("turn for {} failed: {}", activity.conversation.id, e),
                }
            });
        }
        other => {
            log::debug!("ignoring {} activity", other);
            return StatusCode::OK;
        }
    }
    StatusCode::ACCEPTED
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "protocol": PROTOCOL_VERSION,
        "port": state.config.gateway.port,
        "sessions": state.bot.store().len().await,
    }))
}
