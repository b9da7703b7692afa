// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Three route groups: unauthenticated health, webhook receivers (gated by
//! verify-token challenge and body signature), and the bearer-gated
//! operator API.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use handover_config::model::{GatewayConfig, ProviderConfig};
use handover_core::types::Channel;
use handover_core::{HandoffStore, HandoverError};
use handover_channel::ChannelSender;
use handover_verify::VerificationScheduler;

use crate::auth::{AuthConfig, auth_middleware};
use crate::{handlers, webhook};

/// One validated webhook delivery, handed to the dispatcher for
/// per-conversation serialized processing.
#[derive(Debug)]
pub struct WebhookDelivery {
    pub channel: Channel,
    pub org_id: String,
    pub payload: Value,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<dyn HandoffStore>,
    pub sender: Arc<ChannelSender>,
    pub scheduler: Arc<VerificationScheduler>,
    /// Channel feeding validated webhook payloads to the dispatch loop.
    pub webhook_tx: mpsc::Sender<WebhookDelivery>,
    /// TTL applied when an operator locks a conversation.
    pub lock_ttl: std::time::Duration,
    pub auth: AuthConfig,
    /// App secrets per external channel, for webhook signature checks.
    pub business_secret: Option<String>,
    pub social_secret: Option<String>,
}

impl GatewayState {
    /// The app secret guarding webhook deliveries for `channel`, when the
    /// provider is configured with one.
    pub fn webhook_secret(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::BusinessMessaging => self.business_secret.as_deref(),
            Channel::SocialDm => self.social_secret.as_deref(),
            Channel::WebWidget => None,
        }
    }
}

/// Build the full gateway router.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let webhook_routes = Router::new()
        .route(
            "/webhooks/{channel}/{org_id}",
            get(webhook::webhook_challenge).post(webhook::webhook_deliver),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/v1/orgs/{org_id}/conversations",
            get(handlers::list_conversations),
        )
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::list_messages),
        )
        .route("/v1/conversations/{id}/lock", post(handlers::lock_conversation))
        .route(
            "/v1/conversations/{id}/unlock",
            post(handlers::unlock_conversation),
        )
        .route(
            "/v1/conversations/{id}/resolve",
            post(handlers::resolve_conversation),
        )
        .route("/v1/conversations/{id}/reply", post(handlers::operator_reply))
        .route("/v1/conversations/{id}/read", post(handlers::mark_read))
        .route(
            "/v1/orgs/{org_id}/managers",
            get(handlers::list_managers).post(handlers::create_manager),
        )
        .route("/v1/managers/{id}", delete(handlers::delete_manager))
        .route("/v1/orgs/{org_id}/overrides", get(handlers::list_overrides))
        .route(
            "/v1/orgs/{org_id}/overrides/deactivate_all",
            post(handlers::deactivate_all_overrides),
        )
        .route("/v1/orgs/{org_id}/queries", get(handlers::list_queries))
        .route(
            "/v1/orgs/{org_id}/credentials",
            get(handlers::list_credentials).post(handlers::create_credential),
        )
        .route("/v1/credentials/{id}", delete(handlers::delete_credential))
        .route(
            "/v1/credentials/{id}/verify",
            post(handlers::retrigger_verification),
        )
        .route(
            "/v1/credentials/{id}/active",
            post(handlers::set_credential_active),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process is stopped.
pub async fn start_server(
    config: &GatewayConfig,
    business: &ProviderConfig,
    social: &ProviderConfig,
    lock_ttl: std::time::Duration,
    store: Arc<dyn HandoffStore>,
    sender: Arc<ChannelSender>,
    scheduler: Arc<VerificationScheduler>,
    webhook_tx: mpsc::Sender<WebhookDelivery>,
) -> Result<(), HandoverError> {
    let state = GatewayState {
        store,
        sender,
        scheduler,
        webhook_tx,
        lock_ttl,
        auth: AuthConfig {
            bearer_token: config.bearer_token.clone(),
        },
        business_secret: business.app_secret.clone(),
        social_secret: social.app_secret.clone(),
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HandoverError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| HandoverError::Internal(format!("gateway server error: {e}")))
}
