// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam to the external automated-reply collaborator.

use async_trait::async_trait;

use crate::error::HandoverError;
use crate::types::{AgentAssessment, Conversation, InboundEnvelope, StoredMessage};

/// The automated agent that drafts replies to customer messages.
///
/// The natural-language generation behind this trait is an external
/// collaborator; the router only consumes its confidence, optional reply,
/// and optional manager-fact request. Errors and timeouts from this seam
/// must never drop a message -- the router falls back to human handoff.
#[async_trait]
pub trait AutomatedAgent: Send + Sync + 'static {
    /// Assess one inbound message in the context of its conversation.
    async fn assess(
        &self,
        conversation: &Conversation,
        history: &[StoredMessage],
        inbound: &InboundEnvelope,
    ) -> Result<AgentAssessment, HandoverError>;
}
