// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Social-DM connector.
//!
//! Talks to a profile-id-addressed social messaging API: sends go to
//! `POST {api_base}/me/messages` with the access token as a query
//! parameter, probes read the authenticated account object.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use handover_config::model::{DeliveryConfig, ProviderConfig};
use handover_core::types::{AdapterType, Channel, ChannelCredential, HealthStatus, OutboundReply};
use handover_core::{ChannelConnector, HandoverError, PluginAdapter};

use crate::classify::{classify_status, map_request_error};

/// Connector for the social-DM provider API.
pub struct SocialConnector {
    http: reqwest::Client,
    api_base: String,
}

impl SocialConnector {
    /// Build the connector. Requires `social.api_base` to be configured.
    pub fn new(provider: &ProviderConfig, delivery: &DeliveryConfig) -> Result<Self, HandoverError> {
        let api_base = provider.api_base.as_deref().ok_or_else(|| {
            HandoverError::Config("social.api_base is required for the social-DM connector".into())
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
impl PluginAdapter for SocialConnector {
    fn name(&self) -> &str {
        "social-dm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoverError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoverError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelConnector for SocialConnector {
    fn channel(&self) -> Channel {
        Channel::SocialDm
    }

    async fn deliver(
        &self,
        reply: &OutboundReply,
        credential: &ChannelCredential,
    ) -> Result<String, HandoverError> {
        let url = format!("{}/me/messages", self.api_base);
        let response = self
            .http
            .post(&url)
            .query(&[("access_token", credential.access_token.as_str())])
            .json(&json!({
                "recipient": { "id": reply.customer_id },
                "message": { "text": reply.text },
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
            .get("message_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        debug!(org_id = %reply.org_id, %message_id, "social message delivered");
        Ok(message_id)
    }

    async fn probe(&self, credential: &ChannelCredential) -> Result<(), HandoverError> {
        let url = format!("{}/me", self.api_base);
        let response = self
            .http
            .get(&url)
            .query(&[("access_token", credential.access_token.as_str())])
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
