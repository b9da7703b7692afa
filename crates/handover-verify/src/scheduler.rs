// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous credential verification.
//!
//! Saving a credential must not block on the provider, so verification runs
//! as a detached task: a short settle delay, a CAS `unverified -> verifying`
//! guard so the probe runs at most once automatically, then the provider
//! probe with a bounded timeout. Completion is signalled through a oneshot
//! handle instead of a fixed-delay poll, so callers that care (tests, the
//! manual re-trigger endpoint) can await the actual outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};

use handover_channel::ChannelSender;
use handover_config::model::VerificationConfig;
use handover_core::types::CredentialStatus;
use handover_core::{HandoffStore, HandoverError};

/// Terminal result of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Failed { reason: String },
    /// The probe did not run: the credential was deleted, or its status had
    /// already left `unverified` (run-once guard).
    Skipped,
}

/// Awaitable completion signal for a scheduled verification.
pub struct VerificationHandle {
    rx: oneshot::Receiver<VerificationOutcome>,
}

impl VerificationHandle {
    /// Wait for the verification task to finish.
    pub async fn wait(self) -> Result<VerificationOutcome, HandoverError> {
        self.rx
            .await
            .map_err(|_| HandoverError::Internal("verification task dropped".to_string()))
    }
}

/// Schedules and runs credential probes.
pub struct VerificationScheduler {
    store: Arc<dyn HandoffStore>,
    sender: Arc<ChannelSender>,
    config: VerificationConfig,
}

impl VerificationScheduler {
    pub fn new(
        store: Arc<dyn HandoffStore>,
        sender: Arc<ChannelSender>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    /// Schedule the automatic probe for a newly saved credential. Returns
    /// immediately; the probe runs after the configured settle delay.
    pub fn schedule(self: &Arc<Self>, credential_id: String) -> VerificationHandle {
        let (tx, rx) = oneshot::channel();
        let scheduler = Arc::clone(self);
        let delay = Duration::from_secs(self.config.probe_delay_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = match scheduler.run_guarded(&credential_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(credential_id, error = %e, "verification task errored");
                    VerificationOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            // Receiver may have been dropped; the store already holds the
            // result.
            let _ = tx.send(outcome);
        });
        VerificationHandle { rx }
    }

    /// Operator-initiated re-verification. Unlike the automatic probe this
    /// runs from any current status and returns the outcome directly.
    pub async fn retrigger(
        &self,
        credential_id: &str,
    ) -> Result<VerificationOutcome, HandoverError> {
        let moved = self
            .store
            .set_credential_status(credential_id, None, CredentialStatus::Verifying, None)
            .await?;
        if !moved {
            return Ok(VerificationOutcome::Skipped);
        }
        self.probe(credential_id).await
    }

    /// Automatic path: probe only when this task wins the
    /// `unverified -> verifying` CAS.
    async fn run_guarded(
        &self,
        credential_id: &str,
    ) -> Result<VerificationOutcome, HandoverError> {
        let claimed = self
            .store
            .set_credential_status(
                credential_id,
                Some(CredentialStatus::Unverified),
                CredentialStatus::Verifying,
                None,
            )
            .await?;
        if !claimed {
            info!(credential_id, "credential already probed, skipping");
            return Ok(VerificationOutcome::Skipped);
        }
        self.probe(credential_id).await
    }

    async fn probe(&self, credential_id: &str) -> Result<VerificationOutcome, HandoverError> {
        let Some(credential) = self.store.get_credential_by_id(credential_id).await? else {
            return Ok(VerificationOutcome::Skipped);
        };
        let Some(connector) = self.sender.connector(credential.channel) else {
            return self
                .fail(
                    credential_id,
                    format!("no connector registered for channel {}", credential.channel),
                )
                .await;
        };

        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        match tokio::time::timeout(timeout, connector.probe(&credential)).await {
            Ok(Ok(())) => {
                self.store
                    .set_credential_status(
                        credential_id,
                        Some(CredentialStatus::Verifying),
                        CredentialStatus::Verified,
                        None,
                    )
                    .await?;
                info!(credential_id, channel = %credential.channel, "credential verified");
                Ok(VerificationOutcome::Verified)
            }
            Ok(Err(e)) => self.fail(credential_id, e.to_string()).await,
            Err(_) => {
                self.fail(
                    credential_id,
                    format!("probe timed out after {}s", self.config.probe_timeout_secs),
                )
                .await
            }
        }
    }

    async fn fail(
        &self,
        credential_id: &str,
        reason: String,
    ) -> Result<VerificationOutcome, HandoverError> {
        warn!(credential_id, reason, "credential verification failed");
        self.store
            .set_credential_status(
                credential_id,
                Some(CredentialStatus::Verifying),
                CredentialStatus::Failed,
                Some(&reason),
            )
            .await?;
        Ok(VerificationOutcome::Failed { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    use handover_config::model::{DeliveryConfig, StoreConfig};
    use handover_core::types::{
        AdapterType, Channel, ChannelCredential, HealthStatus, OutboundReply,
    };
    use handover_core::{ChannelConnector, PluginAdapter};
    use handover_store::SqliteStore;

    enum ProbeBehavior {
        Succeed,
        Reject(&'static str),
        Hang,
    }

    struct StubConnector {
        behavior: ProbeBehavior,
    }

    #[async_trait]
    impl PluginAdapter for StubConnector {
        fn name(&self) -> &str {
            "stub"
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
    impl ChannelConnector for StubConnector {
        fn channel(&self) -> Channel {
            Channel::BusinessMessaging
        }

        async fn deliver(
            &self,
            _reply: &OutboundReply,
            _credential: &ChannelCredential,
        ) -> Result<String, HandoverError> {
            Ok("sent".to_string())
        }

        async fn probe(&self, _credential: &ChannelCredential) -> Result<(), HandoverError> {
            match self.behavior {
                ProbeBehavior::Succeed => Ok(()),
                ProbeBehavior::Reject(reason) => Err(HandoverError::VerificationFailed {
                    reason: reason.to_string(),
                }),
                ProbeBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            }
        }
    }

    async fn make_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
        let db_path = dir.path().join("verify.db");
        let store = SqliteStore::new(StoreConfig {
            database_path: db_path.to_str().unwrap().to_string(),
            wal_mode: true,
        });
        store.initialize().await.unwrap();
        Arc::new(store)
    }

    fn make_scheduler(
        store: Arc<SqliteStore>,
        behavior: ProbeBehavior,
    ) -> Arc<VerificationScheduler> {
        let mut sender = ChannelSender::new(DeliveryConfig::default());
        sender.register(Arc::new(StubConnector { behavior }));
        Arc::new(VerificationScheduler::new(
            store,
            Arc::new(sender),
            VerificationConfig {
                probe_delay_secs: 0,
                probe_timeout_secs: 1,
            },
        ))
    }

    async fn seed_credential(store: &SqliteStore, status: CredentialStatus) -> ChannelCredential {
        let now = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        let credential = ChannelCredential {
            id: "cr-1".to_string(),
            org_id: "org-1".to_string(),
            channel: Channel::BusinessMessaging,
            provider_account_id: "555001".to_string(),
            access_token: "tok".to_string(),
            verify_token: "vt".to_string(),
            status,
            active: true,
            error_reason: None,
            created_at: now.clone(),
            updated_at: now,
        };
        store.create_credential(&credential).await.unwrap();
        credential
    }

    #[tokio::test]
    async fn successful_probe_verifies_the_credential() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir).await;
        seed_credential(&store, CredentialStatus::Unverified).await;
        let scheduler = make_scheduler(store.clone(), ProbeBehavior::Succeed);

        let outcome = scheduler.schedule("cr-1".to_string()).wait().await.unwrap();
        assert_eq!(outcome, VerificationOutcome::Verified);

        let credential = store.get_credential_by_id("cr-1").await.unwrap().unwrap();
        assert_eq!(credential.status, CredentialStatus::Verified);
        assert!(credential.error_reason.is_none());
    }

    #[tokio::test]
    async fn rejected_probe_fails_with_retained_reason() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir).await;
        seed_credential(&store, CredentialStatus::Unverified).await;
        let scheduler = make_scheduler(store.clone(), ProbeBehavior::Reject("invalid token"));

        let outcome = scheduler.schedule("cr-1".to_string()).wait().await.unwrap();
        let VerificationOutcome::Failed { reason } = outcome else {
            panic!("expected Failed");
        };
        assert!(reason.contains("invalid token"));

        let credential = store.get_credential_by_id("cr-1").await.unwrap().unwrap();
        assert_eq!(credential.status, CredentialStatus::Failed);
        assert!(
            credential
                .error_reason
                .as_deref()
                .unwrap()
                .contains("invalid token")
        );
    }

    #[tokio::test]
    async fn hung_probe_times_out_and_fails() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir).await;
        seed_credential(&store, CredentialStatus::Unverified).await;
        let scheduler = make_scheduler(store.clone(), ProbeBehavior::Hang);

        let outcome = scheduler.schedule("cr-1".to_string()).wait().await.unwrap();
        let VerificationOutcome::Failed { reason } = outcome else {
            panic!("expected Failed");
        };
        assert!(reason.contains("timed out"));
    }

    #[tokio::test]
    async fn automatic_probe_runs_at_most_once() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir).await;
        seed_credential(&store, CredentialStatus::Verified).await;
        let scheduler = make_scheduler(store.clone(), ProbeBehavior::Succeed);

        // Status already left unverified, so the guard declines the probe.
        let outcome = scheduler.schedule("cr-1".to_string()).wait().await.unwrap();
        assert_eq!(outcome, VerificationOutcome::Skipped);
    }

    #[tokio::test]
    async fn deleted_credential_is_skipped() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir).await;
        let scheduler = make_scheduler(store.clone(), ProbeBehavior::Succeed);

        let outcome = scheduler
            .schedule("missing".to_string())
            .wait()
            .await
            .unwrap();
        assert_eq!(outcome, VerificationOutcome::Skipped);
    }

    #[tokio::test]
    async fn retrigger_reprobes_a_failed_credential() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir).await;
        seed_credential(&store, CredentialStatus::Unverified).await;
        store
            .set_credential_status(
                "cr-1",
                None,
                CredentialStatus::Failed,
                Some("provider outage"),
            )
            .await
            .unwrap();
        let scheduler = make_scheduler(store.clone(), ProbeBehavior::Succeed);

        let outcome = scheduler.retrigger("cr-1").await.unwrap();
        assert_eq!(outcome, VerificationOutcome::Verified);

        let credential = store.get_credential_by_id("cr-1").await.unwrap().unwrap();
        assert_eq!(credential.status, CredentialStatus::Verified);
        assert!(credential.error_reason.is_none(), "reason cleared on success");
    }
}
