// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator-facing REST handlers.
//!
//! Every collection endpoint answers with one canonical envelope
//! (`{"data": [...]}`), and domain errors map onto HTTP statuses in one
//! place: lost races and held locks are conflicts, permanent provider
//! rejections are bad gateways.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use handover_channel::widget_credential;
use handover_core::HandoverError;
use handover_core::types::{
    Channel, ChannelCredential, ConversationState, CredentialStatus, ManagerNumber, OutboundReply,
    QueryStatus, SenderKind, StoredMessage,
};
use handover_verify::VerificationOutcome;

use crate::server::GatewayState;

/// Canonical collection/record envelope.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct StateFilter {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageListParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OperatorBody {
    pub operator_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub operator_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub provider_message_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateManagerBody {
    pub phone: String,
    pub display_name: String,
    #[serde(default)]
    pub role_label: Option<String>,
    #[serde(default)]
    pub can_update_hours: bool,
    #[serde(default)]
    pub can_respond_queries: bool,
    #[serde(default)]
    pub can_view_bookings: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCredentialBody {
    pub channel: String,
    pub provider_account_id: String,
    pub access_token: String,
    pub verify_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveBody {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct DeactivatedResponse {
    pub deactivated: u64,
}

#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn error_response(e: HandoverError) -> Response {
    let status = match &e {
        HandoverError::NotFound(_) => StatusCode::NOT_FOUND,
        HandoverError::StaleState { .. }
        | HandoverError::LockDenied { .. }
        | HandoverError::InvalidTransition { .. } => StatusCode::CONFLICT,
        HandoverError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        HandoverError::ChannelSend { .. } | HandoverError::VerificationFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        HandoverError::Transient { .. } | HandoverError::Timeout { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        HandoverError::Config(_) | HandoverError::Storage { .. } | HandoverError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn now_ts() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// GET /health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /v1/orgs/{org_id}/conversations
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
    Query(filter): Query<StateFilter>,
) -> Response {
    let parsed_state = match filter.state.as_deref() {
        Some(raw) => match ConversationState::from_str(raw) {
            Ok(s) => Some(s),
            Err(_) => return bad_request(format!("unknown conversation state: {raw}")),
        },
        None => None,
    };
    match state.store.list_conversations(&org_id, parsed_state).await {
        Ok(conversations) => Json(DataEnvelope {
            data: conversations,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/conversations/{id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(params): Query<MessageListParams>,
) -> Response {
    match state.store.list_messages(&id, params.limit).await {
        Ok(messages) => Json(DataEnvelope { data: messages }).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/conversations/{id}/lock
pub async fn lock_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<OperatorBody>,
) -> Response {
    match state
        .store
        .acquire_lock(&id, &body.operator_id, state.lock_ttl)
        .await
    {
        Ok(()) => {
            info!(conversation_id = %id, operator_id = %body.operator_id, "conversation locked");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /v1/conversations/{id}/unlock
pub async fn unlock_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<OperatorBody>,
) -> Response {
    match state.store.release_lock(&id, &body.operator_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/conversations/{id}/resolve
///
/// CAS from the state the operator last saw; a concurrent move surfaces as
/// a conflict rather than a silent overwrite.
pub async fn resolve_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    let conversation = match state.store.get_conversation(&id).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => return error_response(HandoverError::NotFound(format!("conversation {id}"))),
        Err(e) => return error_response(e),
    };
    match state
        .store
        .transition(&id, conversation.state, ConversationState::Resolved)
        .await
    {
        Ok(()) => {
            info!(conversation_id = %id, "conversation resolved");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /v1/conversations/{id}/reply
///
/// Sends first, persists second: a rejected send must leave the
/// conversation exactly as it was.
pub async fn operator_reply(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ReplyBody>,
) -> Response {
    let conversation = match state.store.get_conversation(&id).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => return error_response(HandoverError::NotFound(format!("conversation {id}"))),
        Err(e) => return error_response(e),
    };

    let credential = if conversation.channel == Channel::WebWidget {
        widget_credential(&conversation.org_id)
    } else {
        match state
            .store
            .get_credential(&conversation.org_id, conversation.channel)
            .await
        {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                return error_response(HandoverError::ChannelSend {
                    code: "no_credential".to_string(),
                    message: format!("no credential for channel {}", conversation.channel),
                });
            }
            Err(e) => return error_response(e),
        }
    };

    let reply = OutboundReply {
        org_id: conversation.org_id.clone(),
        channel: conversation.channel,
        customer_id: conversation.customer_id.clone(),
        text: body.text.clone(),
        sender: SenderKind::Human,
    };
    let provider_message_id = match state.sender.send(&reply, &credential).await {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    let message = StoredMessage {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation.id.clone(),
        sender_kind: SenderKind::Human,
        content: body.text,
        read: true,
        created_at: now_ts(),
    };
    if let Err(e) = state.store.append_message(&message).await {
        return error_response(e);
    }
    info!(
        conversation_id = %id,
        operator_id = %body.operator_id,
        "operator reply delivered"
    );
    Json(DataEnvelope {
        data: ReplyResponse {
            provider_message_id,
        },
    })
    .into_response()
}

/// POST /v1/conversations/{id}/read
pub async fn mark_read(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.store.mark_read(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/orgs/{org_id}/managers
pub async fn list_managers(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
) -> Response {
    match state.store.list_manager_numbers(&org_id, false).await {
        Ok(managers) => Json(DataEnvelope { data: managers }).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/orgs/{org_id}/managers
pub async fn create_manager(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
    Json(body): Json<CreateManagerBody>,
) -> Response {
    let manager = ManagerNumber {
        id: Uuid::new_v4().to_string(),
        org_id,
        phone: body.phone,
        display_name: body.display_name,
        role_label: body.role_label,
        can_update_hours: body.can_update_hours,
        can_respond_queries: body.can_respond_queries,
        can_view_bookings: body.can_view_bookings,
        active: true,
        last_active_at: None,
        created_at: now_ts(),
    };
    match state.store.create_manager_number(&manager).await {
        Ok(()) => (StatusCode::CREATED, Json(DataEnvelope { data: manager })).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /v1/managers/{id}
pub async fn delete_manager(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.store.delete_manager_number(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/orgs/{org_id}/overrides
pub async fn list_overrides(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
) -> Response {
    match state.store.list_active_overrides(&org_id).await {
        Ok(overrides) => Json(DataEnvelope { data: overrides }).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/orgs/{org_id}/overrides/deactivate_all
pub async fn deactivate_all_overrides(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
) -> Response {
    match state.store.deactivate_all_overrides(&org_id).await {
        Ok(deactivated) => Json(DataEnvelope {
            data: DeactivatedResponse { deactivated },
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/orgs/{org_id}/queries
pub async fn list_queries(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
    Query(filter): Query<StatusFilter>,
) -> Response {
    let status = match filter.status.as_deref() {
        Some(raw) => match QueryStatus::from_str(raw) {
            Ok(s) => Some(s),
            Err(_) => return bad_request(format!("unknown query status: {raw}")),
        },
        None => None,
    };
    match state.store.list_manager_queries(&org_id, status).await {
        Ok(queries) => Json(DataEnvelope { data: queries }).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/orgs/{org_id}/credentials
pub async fn list_credentials(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
) -> Response {
    match state.store.list_credentials(&org_id).await {
        Ok(credentials) => Json(DataEnvelope { data: credentials }).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/orgs/{org_id}/credentials
///
/// Saves the credential as `unverified` and schedules the automatic probe;
/// the save never blocks on the provider.
pub async fn create_credential(
    State(state): State<GatewayState>,
    Path(org_id): Path<String>,
    Json(body): Json<CreateCredentialBody>,
) -> Response {
    let Ok(channel) = Channel::from_str(&body.channel) else {
        return bad_request(format!("unknown channel: {}", body.channel));
    };
    let credential = ChannelCredential {
        id: Uuid::new_v4().to_string(),
        org_id,
        channel,
        provider_account_id: body.provider_account_id,
        access_token: body.access_token,
        verify_token: body.verify_token,
        status: CredentialStatus::Unverified,
        active: true,
        error_reason: None,
        created_at: now_ts(),
        updated_at: now_ts(),
    };
    if let Err(e) = state.store.create_credential(&credential).await {
        return error_response(e);
    }
    // Completion is observable through the credential status; the handle is
    // only needed by callers that await the outcome.
    let _handle = state.scheduler.schedule(credential.id.clone());
    info!(credential_id = %credential.id, %channel, "credential saved, verification scheduled");
    (StatusCode::CREATED, Json(DataEnvelope { data: credential })).into_response()
}

/// DELETE /v1/credentials/{id}
pub async fn delete_credential(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete_credential(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/credentials/{id}/verify -- operator-initiated re-probe.
pub async fn retrigger_verification(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.scheduler.retrigger(&id).await {
        Ok(outcome) => {
            let body = match outcome {
                VerificationOutcome::Verified => VerificationResponse {
                    status: "verified".to_string(),
                    reason: None,
                },
                VerificationOutcome::Failed { reason } => VerificationResponse {
                    status: "failed".to_string(),
                    reason: Some(reason),
                },
                VerificationOutcome::Skipped => VerificationResponse {
                    status: "skipped".to_string(),
                    reason: None,
                },
            };
            Json(DataEnvelope { data: body }).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /v1/credentials/{id}/active
pub async fn set_credential_active(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SetActiveBody>,
) -> Response {
    match state.store.set_credential_active(&id, body.active).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::tempdir;
    use tokio::sync::mpsc;

    use handover_channel::{ChannelSender, WidgetConnector};
    use handover_config::model::{DeliveryConfig, StoreConfig, VerificationConfig};
    use handover_core::HandoffStore;
    use handover_store::SqliteStore;
    use handover_verify::VerificationScheduler;

    use crate::auth::AuthConfig;

    async fn make_state(dir: &tempfile::TempDir) -> GatewayState {
        let store = SqliteStore::new(StoreConfig {
            database_path: dir.path().join("api.db").to_str().unwrap().to_string(),
            wal_mode: true,
        });
        store.initialize().await.unwrap();
        let store: Arc<dyn HandoffStore> = Arc::new(store);
        let mut sender = ChannelSender::new(DeliveryConfig::default());
        sender.register(Arc::new(WidgetConnector::new()));
        let sender = Arc::new(sender);
        let scheduler = Arc::new(VerificationScheduler::new(
            store.clone(),
            sender.clone(),
            VerificationConfig {
                probe_delay_secs: 0,
                probe_timeout_secs: 1,
            },
        ));
        let (tx, _rx) = mpsc::channel(8);
        GatewayState {
            store,
            sender,
            scheduler,
            webhook_tx: tx,
            lock_ttl: std::time::Duration::from_secs(300),
            auth: AuthConfig {
                bearer_token: Some("token".to_string()),
            },
            business_secret: None,
            social_secret: None,
        }
    }

    #[tokio::test]
    async fn lock_conflict_is_a_conflict_status() {
        let dir = tempdir().unwrap();
        let state = make_state(&dir).await;
        let conversation = state
            .store
            .upsert_conversation("org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        let response = lock_conversation(
            State(state.clone()),
            Path(conversation.id.clone()),
            Json(OperatorBody {
                operator_id: "op-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = lock_conversation(
            State(state),
            Path(conversation.id),
            Json(OperatorBody {
                operator_id: "op-2".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let dir = tempdir().unwrap();
        let state = make_state(&dir).await;

        let response = resolve_conversation(State(state), Path("missing".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_state_filter_is_a_bad_request() {
        let dir = tempdir().unwrap();
        let state = make_state(&dir).await;

        let response = list_conversations(
            State(state),
            Path("org-1".to_string()),
            Query(StateFilter {
                state: Some("exploded".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn widget_reply_appends_a_human_message() {
        let dir = tempdir().unwrap();
        let state = make_state(&dir).await;
        let conversation = state
            .store
            .upsert_conversation("org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        let response = operator_reply(
            State(state.clone()),
            Path(conversation.id.clone()),
            Json(ReplyBody {
                operator_id: "op-1".to_string(),
                text: "hi, taking over from the bot".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let messages = state
            .store
            .list_messages(&conversation.id, None)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_kind, SenderKind::Human);
    }

    #[tokio::test]
    async fn reply_without_credential_is_a_bad_gateway() {
        let dir = tempdir().unwrap();
        let state = make_state(&dir).await;
        let conversation = state
            .store
            .upsert_conversation("org-1", Channel::BusinessMessaging, "15550100")
            .await
            .unwrap();

        let response = operator_reply(
            State(state.clone()),
            Path(conversation.id.clone()),
            Json(ReplyBody {
                operator_id: "op-1".to_string(),
                text: "hello".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        // A failed send leaves the conversation untouched.
        let messages = state
            .store
            .list_messages(&conversation.id, None)
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn credential_create_starts_unverified() {
        let dir = tempdir().unwrap();
        let state = make_state(&dir).await;

        let response = create_credential(
            State(state.clone()),
            Path("org-1".to_string()),
            Json(CreateCredentialBody {
                channel: "business_messaging".to_string(),
                provider_account_id: "555001".to_string(),
                access_token: "tok".to_string(),
                verify_token: "vt".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let credentials = state.store.list_credentials("org-1").await.unwrap();
        assert_eq!(credentials.len(), 1);
    }

    #[tokio::test]
    async fn manager_crud_round_trips() {
        let dir = tempdir().unwrap();
        let state = make_state(&dir).await;

        let response = create_manager(
            State(state.clone()),
            Path("org-1".to_string()),
            Json(CreateManagerBody {
                phone: "+15550001".to_string(),
                display_name: "Dana".to_string(),
                role_label: Some("owner".to_string()),
                can_update_hours: true,
                can_respond_queries: true,
                can_view_bookings: false,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let managers = state.store.list_manager_numbers("org-1", true).await.unwrap();
        assert_eq!(managers.len(), 1);

        let response =
            delete_manager(State(state.clone()), Path(managers[0].id.clone())).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(
            state
                .store
                .list_manager_numbers("org-1", false)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
