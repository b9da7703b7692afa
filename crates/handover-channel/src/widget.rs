// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web-widget connector.
//!
//! The widget is served by this platform, so there is no provider API:
//! replies are already persisted in the conversation store and the widget
//! client reads them from there. Delivery just mints a message id, and
//! probes always succeed.

use async_trait::async_trait;
use chrono::Utc;

use handover_core::types::{
    AdapterType, Channel, ChannelCredential, CredentialStatus, HealthStatus, OutboundReply,
};
use handover_core::{ChannelConnector, HandoverError, PluginAdapter};

/// Connector for the first-party chat widget.
#[derive(Default)]
pub struct WidgetConnector;

impl WidgetConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Stand-in credential for widget sends.
///
/// The widget has no provider credential row; callers of
/// [`crate::ChannelSender::send`] use this to pass the eligibility gate.
pub fn widget_credential(org_id: &str) -> ChannelCredential {
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    ChannelCredential {
        id: format!("widget-{org_id}"),
        org_id: org_id.to_string(),
        channel: Channel::WebWidget,
        provider_account_id: "widget".to_string(),
        access_token: String::new(),
        verify_token: String::new(),
        status: CredentialStatus::Verified,
        active: true,
        error_reason: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

#[async_trait]
impl PluginAdapter for WidgetConnector {
    fn name(&self) -> &str {
        "web-widget"
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
impl ChannelConnector for WidgetConnector {
    fn channel(&self) -> Channel {
        Channel::WebWidget
    }

    async fn deliver(
        &self,
        _reply: &OutboundReply,
        _credential: &ChannelCredential,
    ) -> Result<String, HandoverError> {
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn probe(&self, _credential: &ChannelCredential) -> Result<(), HandoverError> {
        Ok(())
    }
}
