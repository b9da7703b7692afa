// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Handover workspace.
//!
//! Entity structs mirror the persisted rows one-to-one; timestamps are
//! RFC 3339 UTC strings so lexicographic ordering matches time ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// An external messaging surface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The embedded chat widget served by this platform.
    WebWidget,
    /// Generic business-messaging API (phone-number addressed).
    BusinessMessaging,
    /// Social-DM API (profile-id addressed).
    SocialDm,
}

/// Lifecycle state of a conversation.
///
/// `new -> ai_handling -> {awaiting_user, human_handoff} -> resolved ->
/// archived`, with the reopen edge `resolved|archived -> ai_handling` on new
/// inbound activity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    New,
    AiHandling,
    AwaitingUser,
    HumanHandoff,
    Resolved,
    Archived,
}

impl ConversationState {
    /// Whether `self -> to` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, to: ConversationState) -> bool {
        use ConversationState::*;
        matches!(
            (self, to),
            (New, AiHandling)
                | (AiHandling, AwaitingUser)
                | (AiHandling, HumanHandoff)
                | (AiHandling, Resolved)
                | (AwaitingUser, AiHandling)
                | (AwaitingUser, HumanHandoff)
                | (AwaitingUser, Resolved)
                | (HumanHandoff, AiHandling)
                | (HumanHandoff, Resolved)
                | (Resolved, Archived)
                | (Resolved, AiHandling)
                | (Archived, AiHandling)
        )
    }

    /// Soft-terminal states that reopen to `ai_handling` on inbound activity.
    pub fn is_reopenable(self) -> bool {
        matches!(
            self,
            ConversationState::Resolved | ConversationState::Archived
        )
    }
}

/// Who authored a stored message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Customer,
    AutomatedAgent,
    Human,
    ManagerOverride,
}

/// Verification status of a channel credential.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Unverified,
    Verifying,
    Verified,
    Failed,
}

/// A manager capability. Stored as three independent flags on the row;
/// exposed as a set-of-capabilities abstraction at the API seam.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    UpdateHours,
    RespondToQueries,
    ViewBookings,
}

/// Kind of temporary business-state override.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// Published hours are suspended (closed today, closing early).
    Closure,
    /// Capacity exhausted (fully booked).
    Capacity,
}

/// Status of an escalated manager query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Answered,
    Expired,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    Agent,
}

// --- Inbound/outbound envelope ---

/// Normalized content of an inbound message, a superset of the provider
/// message kinds. Unknown kinds are carried as [`EnvelopeContent::Unsupported`]
/// so the conversation still advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvelopeContent {
    Text {
        body: String,
    },
    Media {
        media_kind: String,
        url: Option<String>,
        caption: Option<String>,
    },
    Postback {
        payload: String,
    },
    Unsupported {
        provider_kind: String,
    },
}

impl EnvelopeContent {
    /// Plain-text rendering used when persisting the message.
    pub fn display_text(&self) -> String {
        match self {
            EnvelopeContent::Text { body } => body.clone(),
            EnvelopeContent::Media {
                media_kind,
                caption,
                ..
            } => match caption {
                Some(c) => format!("[{media_kind}] {c}"),
                None => format!("[{media_kind}]"),
            },
            EnvelopeContent::Postback { payload } => format!("[postback] {payload}"),
            EnvelopeContent::Unsupported { provider_kind } => {
                format!("[unsupported content: {provider_kind}]")
            }
        }
    }

    /// The message text, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EnvelopeContent::Text { body } => Some(body),
            _ => None,
        }
    }
}

/// A provider-agnostic inbound message produced by the channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub org_id: String,
    pub channel: Channel,
    /// Channel-specific customer identifier (phone number, profile id,
    /// widget visitor id).
    pub customer_id: String,
    pub content: EnvelopeContent,
    /// Provider-side message id, when the provider supplies one.
    pub provider_message_id: Option<String>,
    pub sender_display_name: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// An internal reply to be delivered through a channel connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundReply {
    pub org_id: String,
    pub channel: Channel,
    pub customer_id: String,
    pub text: String,
    pub sender: SenderKind,
}

// --- Persisted entities ---

/// A customer thread for one organization on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub org_id: String,
    pub channel: Channel,
    pub customer_id: String,
    pub state: ConversationState,
    pub assigned_operator: Option<String>,
    pub lock_operator: Option<String>,
    pub lock_expires_at: Option<String>,
    pub last_activity_at: String,
    pub unread_count: i64,
    /// Bumped on every successful transition; used for optimistic concurrency.
    pub revision: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    /// The operator holding an unexpired lock at `now`, if any.
    pub fn lock_holder(&self, now: DateTime<Utc>) -> Option<&str> {
        let holder = self.lock_operator.as_deref()?;
        let expires = self.lock_expires_at.as_deref()?;
        let expires = DateTime::parse_from_rfc3339(expires).ok()?;
        if expires.with_timezone(&Utc) > now {
            Some(holder)
        } else {
            None
        }
    }
}

/// One immutable message in a conversation, append-only by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_kind: SenderKind,
    pub content: String,
    pub read: bool,
    pub created_at: String,
}

/// Credentials for one organization on one external channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCredential {
    pub id: String,
    pub org_id: String,
    pub channel: Channel,
    /// Provider-side account identifier (phone-number id, page id).
    pub provider_account_id: String,
    pub access_token: String,
    /// Token the organization chose for the webhook GET challenge.
    pub verify_token: String,
    pub status: CredentialStatus,
    pub active: bool,
    /// Failure reason from the last verification probe, kept for display.
    pub error_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ChannelCredential {
    /// Only a verified and active credential may send or receive.
    pub fn is_eligible(&self) -> bool {
        self.status == CredentialStatus::Verified && self.active
    }
}

/// A phone number authorized to issue control commands for an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerNumber {
    pub id: String,
    pub org_id: String,
    pub phone: String,
    pub display_name: String,
    pub role_label: Option<String>,
    pub can_update_hours: bool,
    pub can_respond_queries: bool,
    pub can_view_bookings: bool,
    pub active: bool,
    pub last_active_at: Option<String>,
    pub created_at: String,
}

impl ManagerNumber {
    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::UpdateHours => self.can_update_hours,
            Capability::RespondToQueries => self.can_respond_queries,
            Capability::ViewBookings => self.can_view_bookings,
        }
    }
}

/// An ephemeral business-state modification issued out-of-band by a manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryOverride {
    pub id: String,
    pub org_id: String,
    pub kind: OverrideKind,
    /// Verbatim manager instruction that produced this override.
    pub instruction: String,
    /// Normalized effect, e.g. "closed until end of day".
    pub effect: String,
    pub priority: i64,
    pub expires_at: Option<String>,
    pub active: bool,
    /// ManagerNumber id, or None for system-created overrides.
    pub created_by: Option<String>,
    pub created_at: String,
}

/// An open question the automated agent escalated to a manager.
/// Never deleted; retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerQuery {
    pub id: String,
    pub conversation_id: String,
    pub org_id: String,
    /// The customer's original question, verbatim.
    pub question: String,
    /// The agent's one-line summary sent to managers.
    pub summary: String,
    pub manager_response: Option<String>,
    pub status: QueryStatus,
    pub created_at: String,
    pub answered_at: Option<String>,
}

/// The automated agent's verdict on one inbound message.
#[derive(Debug, Clone, Default)]
pub struct AgentAssessment {
    /// Confidence in handling this message automatically, 0.0-1.0.
    pub confidence: f64,
    /// Reply text, present when the agent can answer.
    pub reply: Option<String>,
    /// Set when the agent needs a fact only a manager can supply:
    /// (verbatim question, one-line summary).
    pub manager_question: Option<(String, String)>,
}
