// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the HandoffStore trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use handover_config::model::StoreConfig;
use handover_core::types::{
    Channel, ChannelCredential, Conversation, ConversationState, CredentialStatus,
    ManagerNumber, ManagerQuery, QueryStatus, StoredMessage, TemporaryOverride,
};
use handover_core::{AdapterType, HandoffStore, HandoverError, HealthStatus, PluginAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StoreConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`](Self::initialize)
    /// is called.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database at the configured path and run migrations.
    pub async fn initialize(&self) -> Result<(), HandoverError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| HandoverError::Storage {
            source: "store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Checkpoint the WAL ahead of process exit.
    pub async fn close(&self) -> Result<(), HandoverError> {
        self.db()?.close().await
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, HandoverError> {
        self.db.get().ok_or_else(|| HandoverError::Storage {
            source: "store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoverError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoverError> {
        // Shutdown delegates to close if the DB was initialized.
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl HandoffStore for SqliteStore {
    // --- Conversations ---

    async fn upsert_conversation(
        &self,
        org_id: &str,
        channel: Channel,
        customer_id: &str,
    ) -> Result<Conversation, HandoverError> {
        queries::conversations::upsert_conversation(self.db()?, org_id, channel, customer_id)
            .await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, HandoverError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn list_conversations(
        &self,
        org_id: &str,
        state: Option<ConversationState>,
    ) -> Result<Vec<Conversation>, HandoverError> {
        queries::conversations::list_conversations(self.db()?, org_id, state).await
    }

    async fn transition(
        &self,
        id: &str,
        from_expected: ConversationState,
        to: ConversationState,
    ) -> Result<(), HandoverError> {
        queries::conversations::transition(self.db()?, id, from_expected, to).await
    }

    async fn acquire_lock(
        &self,
        id: &str,
        operator_id: &str,
        ttl: Duration,
    ) -> Result<(), HandoverError> {
        queries::conversations::acquire_lock(self.db()?, id, operator_id, ttl).await
    }

    async fn release_lock(&self, id: &str, operator_id: &str) -> Result<(), HandoverError> {
        queries::conversations::release_lock(self.db()?, id, operator_id).await
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), HandoverError> {
        queries::conversations::append_message(self.db()?, message).await
    }

    async fn append_message_with_transition(
        &self,
        message: &StoredMessage,
        from_expected: ConversationState,
        to: ConversationState,
    ) -> Result<(), HandoverError> {
        queries::conversations::append_message_with_transition(
            self.db()?,
            message,
            from_expected,
            to,
        )
        .await
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<StoredMessage>, HandoverError> {
        queries::messages::list_messages(self.db()?, conversation_id, limit).await
    }

    async fn mark_read(&self, conversation_id: &str) -> Result<(), HandoverError> {
        queries::conversations::mark_read(self.db()?, conversation_id).await
    }

    async fn clear_expired_locks(&self) -> Result<u64, HandoverError> {
        queries::conversations::clear_expired_locks(self.db()?).await
    }

    // --- Channel credentials ---

    async fn create_credential(
        &self,
        credential: &ChannelCredential,
    ) -> Result<(), HandoverError> {
        queries::credentials::create_credential(self.db()?, credential).await
    }

    async fn get_credential(
        &self,
        org_id: &str,
        channel: Channel,
    ) -> Result<Option<ChannelCredential>, HandoverError> {
        queries::credentials::get_credential(self.db()?, org_id, channel).await
    }

    async fn get_credential_by_id(
        &self,
        id: &str,
    ) -> Result<Option<ChannelCredential>, HandoverError> {
        queries::credentials::get_credential_by_id(self.db()?, id).await
    }

    async fn list_credentials(
        &self,
        org_id: &str,
    ) -> Result<Vec<ChannelCredential>, HandoverError> {
        queries::credentials::list_credentials(self.db()?, org_id).await
    }

    async fn set_credential_status(
        &self,
        id: &str,
        from_expected: Option<CredentialStatus>,
        to: CredentialStatus,
        error_reason: Option<&str>,
    ) -> Result<bool, HandoverError> {
        queries::credentials::set_credential_status(self.db()?, id, from_expected, to, error_reason)
            .await
    }

    async fn set_credential_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<(), HandoverError> {
        queries::credentials::set_credential_active(self.db()?, id, active).await
    }

    async fn reset_stale_verifications(&self, reason: &str) -> Result<u64, HandoverError> {
        queries::credentials::reset_stale_verifications(self.db()?, reason).await
    }

    async fn delete_credential(&self, id: &str) -> Result<(), HandoverError> {
        queries::credentials::delete_credential(self.db()?, id).await
    }

    // --- Manager numbers ---

    async fn create_manager_number(
        &self,
        number: &ManagerNumber,
    ) -> Result<(), HandoverError> {
        queries::managers::create_manager_number(self.db()?, number).await
    }

    async fn list_manager_numbers(
        &self,
        org_id: &str,
        active_only: bool,
    ) -> Result<Vec<ManagerNumber>, HandoverError> {
        queries::managers::list_manager_numbers(self.db()?, org_id, active_only).await
    }

    async fn find_manager_by_phone(
        &self,
        org_id: &str,
        phone: &str,
    ) -> Result<Option<ManagerNumber>, HandoverError> {
        queries::managers::find_manager_by_phone(self.db()?, org_id, phone).await
    }

    async fn delete_manager_number(&self, id: &str) -> Result<(), HandoverError> {
        queries::managers::delete_manager_number(self.db()?, id).await
    }

    async fn touch_manager_activity(&self, id: &str) -> Result<(), HandoverError> {
        queries::managers::touch_manager_activity(self.db()?, id).await
    }

    // --- Temporary overrides ---

    async fn apply_override(
        &self,
        override_row: &TemporaryOverride,
    ) -> Result<u64, HandoverError> {
        queries::overrides::apply_override(self.db()?, override_row).await
    }

    async fn list_active_overrides(
        &self,
        org_id: &str,
    ) -> Result<Vec<TemporaryOverride>, HandoverError> {
        queries::overrides::list_active_overrides(self.db()?, org_id).await
    }

    async fn deactivate_all_overrides(&self, org_id: &str) -> Result<u64, HandoverError> {
        queries::overrides::deactivate_all_overrides(self.db()?, org_id).await
    }

    // --- Manager queries ---

    async fn create_manager_query(&self, query: &ManagerQuery) -> Result<(), HandoverError> {
        queries::manager_queries::create_manager_query(self.db()?, query).await
    }

    async fn newest_pending_query(
        &self,
        org_id: &str,
    ) -> Result<Option<ManagerQuery>, HandoverError> {
        queries::manager_queries::newest_pending_query(self.db()?, org_id).await
    }

    async fn answer_manager_query(
        &self,
        id: &str,
        response: &str,
    ) -> Result<bool, HandoverError> {
        queries::manager_queries::answer_manager_query(self.db()?, id, response).await
    }

    async fn get_manager_query(&self, id: &str) -> Result<Option<ManagerQuery>, HandoverError> {
        queries::manager_queries::get_manager_query(self.db()?, id).await
    }

    async fn list_manager_queries(
        &self,
        org_id: &str,
        status: Option<QueryStatus>,
    ) -> Result<Vec<ManagerQuery>, HandoverError> {
        queries::manager_queries::list_manager_queries(self.db()?, org_id, status).await
    }

    async fn count_pending_queries(&self, org_id: &str) -> Result<i64, HandoverError> {
        queries::manager_queries::count_pending_queries(self.db()?, org_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handover_core::types::SenderKind;
    use tempfile::tempdir;

    use crate::database::now_ts;

    fn make_config(path: &str) -> StoreConfig {
        StoreConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_store_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        let result = store.initialize().await;
        assert!(result.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        let result = store.health_check().await;
        assert!(result.is_err(), "health_check should fail before initialize");
    }

    #[tokio::test]
    async fn health_check_returns_healthy_when_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        let status = store.health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn full_conversation_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();

        // Customer opens a conversation.
        let conv = store
            .upsert_conversation("org-1", Channel::WebWidget, "visitor-1")
            .await
            .unwrap();
        assert_eq!(conv.state, ConversationState::New);

        // First inbound message moves it to the automated agent.
        let message = StoredMessage {
            id: "m1".to_string(),
            conversation_id: conv.id.clone(),
            sender_kind: SenderKind::Customer,
            content: "are you open?".to_string(),
            read: false,
            created_at: now_ts(),
        };
        store
            .append_message_with_transition(
                &message,
                ConversationState::New,
                ConversationState::AiHandling,
            )
            .await
            .unwrap();

        // Agent escalates; an operator takes the lock and resolves.
        store
            .transition(
                &conv.id,
                ConversationState::AiHandling,
                ConversationState::HumanHandoff,
            )
            .await
            .unwrap();
        store
            .acquire_lock(&conv.id, "op-1", Duration::from_secs(600))
            .await
            .unwrap();
        store.mark_read(&conv.id).await.unwrap();
        store
            .transition(
                &conv.id,
                ConversationState::HumanHandoff,
                ConversationState::Resolved,
            )
            .await
            .unwrap();
        store.release_lock(&conv.id, "op-1").await.unwrap();

        let conv = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(conv.state, ConversationState::Resolved);
        assert_eq!(conv.unread_count, 0);
        assert!(conv.lock_operator.is_none());
        // new -> ai_handling -> human_handoff -> resolved.
        assert_eq!(conv.revision, 3);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_runs_checkpoint() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("shutdown.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();

        store
            .upsert_conversation("org-1", Channel::WebWidget, "visitor-1")
            .await
            .unwrap();

        store.shutdown().await.unwrap();
    }
}
