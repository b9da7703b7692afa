// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage trait: the authoritative conversation store and all persisted
//! entities behind it.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::HandoverError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Channel, ChannelCredential, Conversation, ConversationState, CredentialStatus,
    ManagerNumber, ManagerQuery, QueryStatus, StoredMessage, TemporaryOverride,
};

/// The single source of truth for conversation lifecycle state and the
/// records around it.
///
/// State-changing conversation operations use compare-and-swap semantics:
/// [`transition`](HandoffStore::transition) fails with
/// [`HandoverError::StaleState`] when the current state differs from the
/// caller's expectation, and [`acquire_lock`](HandoffStore::acquire_lock)
/// fails with [`HandoverError::LockDenied`] when an unexpired lock is held.
#[async_trait]
pub trait HandoffStore: PluginAdapter {
    // --- Conversations ---

    /// Finds or creates the conversation for `(org, channel, customer)`.
    /// New conversations start in `new`; existing rows are returned as-is.
    async fn upsert_conversation(
        &self,
        org_id: &str,
        channel: Channel,
        customer_id: &str,
    ) -> Result<Conversation, HandoverError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, HandoverError>;

    async fn list_conversations(
        &self,
        org_id: &str,
        state: Option<ConversationState>,
    ) -> Result<Vec<Conversation>, HandoverError>;

    /// Compare-and-swap state transition. Bumps the revision counter on
    /// success; fails with `StaleState` when the row's state is not
    /// `from_expected`, or `InvalidTransition` for a non-lifecycle edge.
    async fn transition(
        &self,
        id: &str,
        from_expected: ConversationState,
        to: ConversationState,
    ) -> Result<(), HandoverError>;

    /// Acquires the operator exclusivity lock. Succeeds only when the
    /// conversation is unlocked or the previous lock has expired.
    async fn acquire_lock(
        &self,
        id: &str,
        operator_id: &str,
        ttl: Duration,
    ) -> Result<(), HandoverError>;

    /// Releases the lock if `operator_id` is the current holder.
    async fn release_lock(&self, id: &str, operator_id: &str) -> Result<(), HandoverError>;

    /// Appends a message and touches last-activity / unread bookkeeping.
    async fn append_message(&self, message: &StoredMessage) -> Result<(), HandoverError>;

    /// Appends a message and applies a CAS transition in one transaction.
    /// Either both apply or neither does.
    async fn append_message_with_transition(
        &self,
        message: &StoredMessage,
        from_expected: ConversationState,
        to: ConversationState,
    ) -> Result<(), HandoverError>;

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<StoredMessage>, HandoverError>;

    /// Marks all messages read and resets the unread counter.
    async fn mark_read(&self, conversation_id: &str) -> Result<(), HandoverError>;

    /// Clears locks whose TTL has elapsed. Returns the number cleared.
    /// Run at startup for crash recovery; expiry is otherwise checked lazily.
    async fn clear_expired_locks(&self) -> Result<u64, HandoverError>;

    // --- Channel credentials ---

    async fn create_credential(
        &self,
        credential: &ChannelCredential,
    ) -> Result<(), HandoverError>;

    async fn get_credential(
        &self,
        org_id: &str,
        channel: Channel,
    ) -> Result<Option<ChannelCredential>, HandoverError>;

    async fn get_credential_by_id(
        &self,
        id: &str,
    ) -> Result<Option<ChannelCredential>, HandoverError>;

    async fn list_credentials(
        &self,
        org_id: &str,
    ) -> Result<Vec<ChannelCredential>, HandoverError>;

    /// Compare-and-swap status update. When `from_expected` is `Some`, the
    /// update applies only if the current status matches; returns whether
    /// the row changed. The error reason is retained on `failed`.
    async fn set_credential_status(
        &self,
        id: &str,
        from_expected: Option<CredentialStatus>,
        to: CredentialStatus,
        error_reason: Option<&str>,
    ) -> Result<bool, HandoverError>;

    async fn set_credential_active(&self, id: &str, active: bool)
        -> Result<(), HandoverError>;

    /// Marks every credential stuck in `verifying` as `failed` with
    /// `reason`. Run at startup: a probe interrupted by a crash never
    /// completes its CAS, and the row would stay `verifying` forever.
    /// Returns the number of rows moved.
    async fn reset_stale_verifications(&self, reason: &str) -> Result<u64, HandoverError>;

    async fn delete_credential(&self, id: &str) -> Result<(), HandoverError>;

    // --- Manager numbers ---

    async fn create_manager_number(&self, number: &ManagerNumber)
        -> Result<(), HandoverError>;

    async fn list_manager_numbers(
        &self,
        org_id: &str,
        active_only: bool,
    ) -> Result<Vec<ManagerNumber>, HandoverError>;

    async fn find_manager_by_phone(
        &self,
        org_id: &str,
        phone: &str,
    ) -> Result<Option<ManagerNumber>, HandoverError>;

    async fn delete_manager_number(&self, id: &str) -> Result<(), HandoverError>;

    /// Records that a manager number just sent or received a message.
    async fn touch_manager_activity(&self, id: &str) -> Result<(), HandoverError>;

    // --- Temporary overrides ---

    /// Inserts an override, deactivating active overrides of the same kind
    /// and lower priority for the organization. Returns how many were
    /// superseded.
    async fn apply_override(
        &self,
        override_row: &TemporaryOverride,
    ) -> Result<u64, HandoverError>;

    /// Active, unexpired overrides for the organization, highest priority
    /// first. Expiry is filtered at read time.
    async fn list_active_overrides(
        &self,
        org_id: &str,
    ) -> Result<Vec<TemporaryOverride>, HandoverError>;

    /// Deactivates every active override for the organization. Idempotent;
    /// returns the number deactivated (0 on repeat calls).
    async fn deactivate_all_overrides(&self, org_id: &str) -> Result<u64, HandoverError>;

    // --- Manager queries ---

    async fn create_manager_query(&self, query: &ManagerQuery)
        -> Result<(), HandoverError>;

    /// The newest pending query for the organization, if any.
    async fn newest_pending_query(
        &self,
        org_id: &str,
    ) -> Result<Option<ManagerQuery>, HandoverError>;

    /// CAS pending -> answered with the manager's response. Returns whether
    /// the update applied (false when another reply won the race).
    async fn answer_manager_query(
        &self,
        id: &str,
        response: &str,
    ) -> Result<bool, HandoverError>;

    async fn get_manager_query(&self, id: &str) -> Result<Option<ManagerQuery>, HandoverError>;

    async fn list_manager_queries(
        &self,
        org_id: &str,
        status: Option<QueryStatus>,
    ) -> Result<Vec<ManagerQuery>, HandoverError>;

    async fn count_pending_queries(&self, org_id: &str) -> Result<i64, HandoverError>;
}
