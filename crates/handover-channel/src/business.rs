// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Business-messaging connector.
//!
//! Talks to a phone-number-addressed business messaging API: sends go to
//! `POST {api_base}/{account_id}/messages` with a bearer token, probes read
//! the account object. One instance serves every organization; the
//! credential arrives per call.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use handover_config::model::{DeliveryConfig, ProviderConfig};
use handover_core::types::{AdapterType, Channel, ChannelCredential, HealthStatus, OutboundReply};
use handover_core::{ChannelConnector, HandoverError, PluginAdapter};

use crate::classify::{classify_status, map_request_error};

/// Connector for the business-messaging provider API.
pub struct BusinessConnector {
    http: reqwest::Client,
    api_base: String,
}

impl BusinessConnector {
    /// Build the connector. Requires `business.api_base` to be configured.
    pub fn new(provider: &ProviderConfig, delivery: &DeliveryConfig) -> Result<Self, HandoverError> {
        let api_base = provider.api_base.as_deref().ok_or_else(|| {
            HandoverError::Config(
                "business.api_base is required for the business-messaging connector".into(),
            )
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(delivery.request_timeout_secs))
            .build()
            .map_err(|e| HandoverError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PluginAdapter for BusinessConnector {
    fn name(&self) -> &str {
        "business-messaging"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoverError> {
        // The connector is a stateless HTTP client; credential-level checks
        // happen through probe().
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoverError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelConnector for BusinessConnector {
    fn channel(&self) -> Channel {
        Channel::BusinessMessaging
    }

    async fn deliver(
        &self,
        reply: &OutboundReply,
        credential: &ChannelCredential,
    ) -> Result<String, HandoverError> {
        let url = format!(
            "{}/{}/messages",
            self.api_base, credential.provider_account_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&credential.access_token)
            .json(&json!({
                "to": reply.customer_id,
                "type": "text",
                "text": { "body": reply.text },
            }))
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: Value = response.json().await.map_err(map_request_error)?;
        let message_id = body
            .pointer("/messages/0/id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        debug!(org_id = %reply.org_id, %message_id, "business message delivered");
        Ok(message_id)
    }

    async fn probe(&self, credential: &ChannelCredential) -> Result<(), HandoverError> {
        let url = format!("{}/{}", self.api_base, credential.provider_account_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(HandoverError::Transient {
                message: format!("probe got {status}"),
                source: None,
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(HandoverError::VerificationFailed {
            reason: format!("provider returned {status}: {body}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handover_core::types::{CredentialStatus, SenderKind};
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_connector(api_base: &str) -> BusinessConnector {
        let provider = ProviderConfig {
            api_base: Some(api_base.to_string()),
            app_secret: Some("secret".to_string()),
        };
        BusinessConnector::new(&provider, &DeliveryConfig::default()).unwrap()
    }

    fn make_credential() -> ChannelCredential {
        ChannelCredential {
            id: "cr-1".to_string(),
            org_id: "org-1".to_string(),
            channel: Channel::BusinessMessaging,
            provider_account_id: "555001".to_string(),
            access_token: "token-abc".to_string(),
            verify_token: "vt".to_string(),
            status: CredentialStatus::Verified,
            active: true,
            error_reason: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    fn make_reply() -> OutboundReply {
        OutboundReply {
            org_id: "org-1".to_string(),
            channel: Channel::BusinessMessaging,
            customer_id: "15550100".to_string(),
            text: "we're open until 9pm".to_string(),
            sender: SenderKind::AutomatedAgent,
        }
    }

    #[test]
    fn new_requires_api_base() {
        let provider = ProviderConfig::default();
        assert!(BusinessConnector::new(&provider, &DeliveryConfig::default()).is_err());
    }

    #[tokio::test]
    async fn deliver_posts_to_account_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/555001/messages"))
            .and(bearer_token("token-abc"))
            .and(body_partial_json(serde_json::json!({
                "to": "15550100",
                "text": { "body": "we're open until 9pm" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{ "id": "provider-msg-1" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let connector = make_connector(&server.uri());
        let message_id = connector
            .deliver(&make_reply(), &make_credential())
            .await
            .unwrap();
        assert_eq!(message_id, "provider-msg-1");
    }

    #[tokio::test]
    async fn deliver_classifies_auth_failure_as_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/555001/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let connector = make_connector(&server.uri());
        let err = connector
            .deliver(&make_reply(), &make_credential())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(matches!(err, HandoverError::ChannelSend { .. }));
    }

    #[tokio::test]
    async fn deliver_classifies_server_error_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/555001/messages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let connector = make_connector(&server.uri());
        let err = connector
            .deliver(&make_reply(), &make_credential())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn probe_accepts_valid_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/555001"))
            .and(bearer_token("token-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "555001"
            })))
            .mount(&server)
            .await;

        let connector = make_connector(&server.uri());
        connector.probe(&make_credential()).await.unwrap();
    }

    #[tokio::test]
    async fn probe_reports_rejection_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/555001"))
            .respond_with(ResponseTemplate::new(403).set_body_string("token expired"))
            .mount(&server)
            .await;

        let connector = make_connector(&server.uri());
        let err = connector.probe(&make_credential()).await.unwrap_err();
        match err {
            HandoverError::VerificationFailed { reason } => {
                assert!(reason.contains("403"));
                assert!(reason.contains("token expired"));
            }
            other => panic!("expected VerificationFailed, got {other}"),
        }
    }
}
