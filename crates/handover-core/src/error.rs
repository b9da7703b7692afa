// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Handover engine.

use thiserror::Error;

use crate::types::ConversationState;

/// The primary error type used across all Handover components.
#[derive(Debug, Error)]
pub enum HandoverError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A compare-and-swap state transition lost a race. The caller must
    /// re-read the conversation and retry.
    #[error("stale state on conversation {conversation_id}: expected {expected}, found {actual}")]
    StaleState {
        conversation_id: String,
        expected: ConversationState,
        actual: ConversationState,
    },

    /// The requested transition is not an edge of the conversation lifecycle.
    #[error("invalid transition {from} -> {to} on conversation {conversation_id}")]
    InvalidTransition {
        conversation_id: String,
        from: ConversationState,
        to: ConversationState,
    },

    /// The conversation is held by another operator with an unexpired lock.
    #[error("conversation {conversation_id} locked by {holder} until {expires_at}")]
    LockDenied {
        conversation_id: String,
        holder: String,
        expires_at: String,
    },

    /// Permanent provider rejection (auth failure, invalid recipient).
    /// Never retried.
    #[error("channel send rejected ({code}): {message}")]
    ChannelSend { code: String, message: String },

    /// Transient channel or provider failure (rate limit, 5xx, connection
    /// reset). Retried with backoff up to the attempt cap, then surfaced.
    #[error("transient channel failure: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A manager issued a well-formed command without the required capability.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A credential verification probe was rejected by the provider.
    #[error("credential verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandoverError {
    /// Whether the channel adapter may retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HandoverError::Transient { .. } | HandoverError::Timeout { .. }
        )
    }
}
