// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel webhook receivers.
//!
//! GET is the provider subscription challenge: echo `hub.challenge` when
//! `hub.verify_token` matches the organization's stored credential. POST is
//! a delivery: the raw body is signature-checked against the provider app
//! secret, parsed, and queued for the dispatch loop. Deliveries are accepted
//! even while the credential is unverified -- the router defers routing, the
//! message itself is never dropped.

use std::str::FromStr;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use handover_core::types::Channel;

use crate::auth::verify_webhook_signature;
use crate::server::{GatewayState, WebhookDelivery};

/// Query parameters of the provider subscription challenge.
#[derive(Debug, Deserialize)]
pub struct ChallengeParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhooks/{channel}/{org_id}
pub async fn webhook_challenge(
    State(state): State<GatewayState>,
    Path((channel, org_id)): Path<(String, String)>,
    Query(params): Query<ChallengeParams>,
) -> Response {
    let Ok(channel) = Channel::from_str(&channel) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if channel == Channel::WebWidget {
        // First-party widget traffic has no provider subscription handshake.
        return StatusCode::NOT_FOUND.into_response();
    }

    let credential = match state.store.get_credential(&org_id, channel).await {
        Ok(Some(credential)) => credential,
        Ok(None) => return StatusCode::FORBIDDEN.into_response(),
        Err(e) => {
            warn!(org_id, %channel, error = %e, "challenge lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let token_matches = params.verify_token.as_deref() == Some(credential.verify_token.as_str());
    match (params.mode.as_deref(), token_matches, params.challenge) {
        (Some("subscribe"), true, Some(challenge)) => {
            debug!(org_id, %channel, "webhook challenge accepted");
            (StatusCode::OK, challenge).into_response()
        }
        _ => StatusCode::FORBIDDEN.into_response(),
    }
}

/// POST /webhooks/{channel}/{org_id}
pub async fn webhook_deliver(
    State(state): State<GatewayState>,
    Path((channel, org_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Ok(channel) = Channel::from_str(&channel) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // External channels require a valid body signature. The widget is
    // first-party and carries none.
    if channel != Channel::WebWidget {
        let Some(secret) = state.webhook_secret(channel) else {
            warn!(%channel, "webhook delivery without a configured app secret");
            return StatusCode::FORBIDDEN.into_response();
        };
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_webhook_signature(secret, &body, signature) {
            warn!(org_id, %channel, "webhook signature rejected");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(org_id, %channel, error = %e, "unparseable webhook body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let delivery = WebhookDelivery {
        channel,
        org_id,
        payload,
    };
    match tokio::time::timeout(Duration::from_secs(5), state.webhook_tx.send(delivery)).await {
        Ok(Ok(())) => (StatusCode::OK, "accepted").into_response(),
        _ => {
            warn!(%channel, "dispatch queue unavailable, webhook rejected");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::tempdir;
    use tokio::sync::mpsc;

    use handover_channel::ChannelSender;
    use handover_config::model::{DeliveryConfig, StoreConfig, VerificationConfig};
    use handover_core::HandoffStore;
    use handover_core::types::{ChannelCredential, CredentialStatus};
    use handover_store::SqliteStore;
    use handover_verify::VerificationScheduler;

    use crate::auth::{AuthConfig, sign_webhook_body};

    async fn make_state(
        dir: &tempfile::TempDir,
    ) -> (GatewayState, mpsc::Receiver<WebhookDelivery>) {
        let store = SqliteStore::new(StoreConfig {
            database_path: dir.path().join("wh.db").to_str().unwrap().to_string(),
            wal_mode: true,
        });
        store.initialize().await.unwrap();
        let store: Arc<dyn HandoffStore> = Arc::new(store);
        let sender = Arc::new(ChannelSender::new(DeliveryConfig::default()));
        let scheduler = Arc::new(VerificationScheduler::new(
            store.clone(),
            sender.clone(),
            VerificationConfig::default(),
        ));
        let (tx, rx) = mpsc::channel(8);
        let state = GatewayState {
            store,
            sender,
            scheduler,
            webhook_tx: tx,
            lock_ttl: std::time::Duration::from_secs(900),
            auth: AuthConfig { bearer_token: None },
            business_secret: Some("app-secret".to_string()),
            social_secret: None,
        };
        (state, rx)
    }

    async fn seed_credential(state: &GatewayState) {
        let now = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        state
            .store
            .create_credential(&ChannelCredential {
                id: "cr-1".to_string(),
                org_id: "org-1".to_string(),
                channel: Channel::BusinessMessaging,
                provider_account_id: "555001".to_string(),
                access_token: "tok".to_string(),
                verify_token: "expected-token".to_string(),
                status: CredentialStatus::Unverified,
                active: true,
                error_reason: None,
                created_at: now.clone(),
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn challenge_params(token: &str) -> ChallengeParams {
        ChallengeParams {
            mode: Some("subscribe".to_string()),
            verify_token: Some(token.to_string()),
            challenge: Some("12345".to_string()),
        }
    }

    #[tokio::test]
    async fn challenge_echoes_on_matching_token() {
        let dir = tempdir().unwrap();
        let (state, _rx) = make_state(&dir).await;
        seed_credential(&state).await;

        let response = webhook_challenge(
            State(state),
            Path(("business_messaging".to_string(), "org-1".to_string())),
            Query(challenge_params("expected-token")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn challenge_rejects_a_wrong_token() {
        let dir = tempdir().unwrap();
        let (state, _rx) = make_state(&dir).await;
        seed_credential(&state).await;

        let response = webhook_challenge(
            State(state),
            Path(("business_messaging".to_string(), "org-1".to_string())),
            Query(challenge_params("wrong")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn challenge_without_credential_is_forbidden() {
        let dir = tempdir().unwrap();
        let (state, _rx) = make_state(&dir).await;

        let response = webhook_challenge(
            State(state),
            Path(("business_messaging".to_string(), "org-1".to_string())),
            Query(challenge_params("expected-token")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn signed_delivery_is_queued() {
        let dir = tempdir().unwrap();
        let (state, mut rx) = make_state(&dir).await;
        let body = br#"{"entry":[]}"#;
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-hub-signature-256",
            sign_webhook_body("app-secret", body).parse().unwrap(),
        );

        let response = webhook_deliver(
            State(state),
            Path(("business_messaging".to_string(), "org-1".to_string())),
            headers,
            Bytes::from_static(body),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.channel, Channel::BusinessMessaging);
        assert_eq!(delivery.org_id, "org-1");
    }

    #[tokio::test]
    async fn unsigned_delivery_is_rejected() {
        let dir = tempdir().unwrap();
        let (state, mut rx) = make_state(&dir).await;

        let response = webhook_deliver(
            State(state),
            Path(("business_messaging".to_string(), "org-1".to_string())),
            HeaderMap::new(),
            Bytes::from_static(br#"{"entry":[]}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(rx.try_recv().is_err(), "nothing queued");
    }

    #[tokio::test]
    async fn widget_delivery_needs_no_signature() {
        let dir = tempdir().unwrap();
        let (state, mut rx) = make_state(&dir).await;

        let response = webhook_deliver(
            State(state),
            Path(("web_widget".to_string(), "org-1".to_string())),
            HeaderMap::new(),
            Bytes::from_static(br#"{"visitor_id":"v-1","text":"hi"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().channel, Channel::WebWidget);
    }

    #[tokio::test]
    async fn unknown_channel_is_not_found() {
        let dir = tempdir().unwrap();
        let (state, _rx) = make_state(&dir).await;

        let response = webhook_deliver(
            State(state),
            Path(("telegram".to_string(), "org-1".to_string())),
            HeaderMap::new(),
            Bytes::from_static(b"{}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let dir = tempdir().unwrap();
        let (state, _rx) = make_state(&dir).await;

        let response = webhook_deliver(
            State(state),
            Path(("web_widget".to_string(), "org-1".to_string())),
            HeaderMap::new(),
            Bytes::from_static(b"not json"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
