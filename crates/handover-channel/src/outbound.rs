// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery with retry.
//!
//! [`ChannelSender`] owns the retry policy: connectors attempt a delivery
//! exactly once and classify the failure, the sender retries transient
//! failures with capped exponential backoff up to the configured attempt
//! cap. Permanent rejections are surfaced immediately so the router can
//! flag the conversation instead of silently losing the reply.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use handover_config::model::DeliveryConfig;
use handover_core::types::{Channel, ChannelCredential, OutboundReply};
use handover_core::{ChannelConnector, HandoverError};

/// Channel-dispatching outbound sender.
pub struct ChannelSender {
    connectors: HashMap<Channel, Arc<dyn ChannelConnector>>,
    delivery: DeliveryConfig,
}

impl ChannelSender {
    pub fn new(delivery: DeliveryConfig) -> Self {
        Self {
            connectors: HashMap::new(),
            delivery,
        }
    }

    /// Register a connector for its channel, replacing any previous one.
    pub fn register(&mut self, connector: Arc<dyn ChannelConnector>) {
        self.connectors.insert(connector.channel(), connector);
    }

    /// The connector serving `channel`, if one is registered.
    pub fn connector(&self, channel: Channel) -> Option<Arc<dyn ChannelConnector>> {
        self.connectors.get(&channel).cloned()
    }

    /// Deliver one reply, retrying transient failures.
    ///
    /// Only a verified and active credential may send; anything else is a
    /// permanent `ChannelSend` rejection. Returns the provider message id.
    pub async fn send(
        &self,
        reply: &OutboundReply,
        credential: &ChannelCredential,
    ) -> Result<String, HandoverError> {
        if !credential.is_eligible() {
            return Err(HandoverError::ChannelSend {
                code: "credential_ineligible".to_string(),
                message: format!(
                    "credential for {} is {} (active: {})",
                    reply.channel, credential.status, credential.active
                ),
            });
        }
        let connector = self.connectors.get(&reply.channel).ok_or_else(|| {
            HandoverError::Internal(format!(
                "no connector registered for channel {}",
                reply.channel
            ))
        })?;

        let max_backoff = Duration::from_millis(self.delivery.max_backoff_ms);
        let mut backoff = Duration::from_millis(self.delivery.base_backoff_ms);
        let mut attempt: u32 = 1;
        loop {
            match connector.deliver(reply, credential).await {
                Ok(message_id) => return Ok(message_id),
                Err(e) if e.is_transient() && attempt < self.delivery.max_attempts => {
                    warn!(
                        channel = %reply.channel,
                        attempt,
                        error = %e,
                        "transient delivery failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use handover_core::PluginAdapter;
    use handover_core::types::{AdapterType, CredentialStatus, HealthStatus, SenderKind};

    /// Connector that fails a set number of times before succeeding.
    struct FlakyConnector {
        calls: AtomicU32,
        failures: u32,
        permanent: bool,
    }

    impl FlakyConnector {
        fn transient(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                permanent: false,
            }
        }

        fn permanent() -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures: u32::MAX,
                permanent: true,
            }
        }
    }

    #[async_trait]
    impl PluginAdapter for FlakyConnector {
        fn name(&self) -> &str {
            "flaky"
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
    impl ChannelConnector for FlakyConnector {
        fn channel(&self) -> Channel {
            Channel::BusinessMessaging
        }

        async fn deliver(
            &self,
            _reply: &OutboundReply,
            _credential: &ChannelCredential,
        ) -> Result<String, HandoverError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.permanent {
                    return Err(HandoverError::ChannelSend {
                        code: "400".to_string(),
                        message: "invalid recipient".to_string(),
                    });
                }
                return Err(HandoverError::Transient {
                    message: "503".to_string(),
                    source: None,
                });
            }
            Ok("delivered".to_string())
        }

        async fn probe(&self, _credential: &ChannelCredential) -> Result<(), HandoverError> {
            Ok(())
        }
    }

    fn fast_delivery() -> DeliveryConfig {
        DeliveryConfig {
            max_attempts: 5,
            base_backoff_ms: 1,
            max_backoff_ms: 4,
            request_timeout_secs: 1,
        }
    }

    fn make_credential(status: CredentialStatus, active: bool) -> ChannelCredential {
        ChannelCredential {
            id: "cr-1".to_string(),
            org_id: "org-1".to_string(),
            channel: Channel::BusinessMessaging,
            provider_account_id: "555001".to_string(),
            access_token: "tok".to_string(),
            verify_token: "vt".to_string(),
            status,
            active,
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
            text: "hi".to_string(),
            sender: SenderKind::AutomatedAgent,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_to_success() {
        let connector = Arc::new(FlakyConnector::transient(2));
        let mut sender = ChannelSender::new(fast_delivery());
        sender.register(connector.clone());

        let id = sender
            .send(&make_reply(), &make_credential(CredentialStatus::Verified, true))
            .await
            .unwrap();
        assert_eq!(id, "delivered");
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_the_attempt_cap() {
        let connector = Arc::new(FlakyConnector::transient(u32::MAX));
        let mut sender = ChannelSender::new(fast_delivery());
        sender.register(connector.clone());

        let err = sender
            .send(&make_reply(), &make_credential(CredentialStatus::Verified, true))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "exhausted retries surface the error");
        assert_eq!(connector.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let connector = Arc::new(FlakyConnector::permanent());
        let mut sender = ChannelSender::new(fast_delivery());
        sender.register(connector.clone());

        let err = sender
            .send(&make_reply(), &make_credential(CredentialStatus::Verified, true))
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::ChannelSend { .. }));
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ineligible_credential_never_reaches_the_connector() {
        let connector = Arc::new(FlakyConnector::transient(0));
        let mut sender = ChannelSender::new(fast_delivery());
        sender.register(connector.clone());

        for credential in [
            make_credential(CredentialStatus::Unverified, true),
            make_credential(CredentialStatus::Verifying, true),
            make_credential(CredentialStatus::Failed, true),
            make_credential(CredentialStatus::Verified, false),
        ] {
            let err = sender.send(&make_reply(), &credential).await.unwrap_err();
            assert!(matches!(err, HandoverError::ChannelSend { .. }));
        }
        assert_eq!(connector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_connector_is_an_internal_error() {
        let sender = ChannelSender::new(fast_delivery());
        let err = sender
            .send(&make_reply(), &make_credential(CredentialStatus::Verified, true))
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Internal(_)));
    }
}
