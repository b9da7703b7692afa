// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The handoff router: decides, per inbound message, whether the automated
//! agent replies, a human takes over, or a manager is asked for a fact.
//!
//! The store is authoritative for all state; the router only issues CAS
//! transitions against it. A customer message is persisted before any
//! routing decision that could fail, so agent errors and timeouts degrade
//! to human handoff instead of dropping the message.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use handover_config::model::RoutingConfig;
use handover_core::types::{
    Channel, Conversation, ConversationState, InboundEnvelope, ManagerNumber, ManagerQuery,
    QueryStatus, SenderKind, StoredMessage,
};
use handover_core::{AutomatedAgent, HandoffStore, HandoverError};

use crate::intent::matches_human_intent;

/// How many recent messages the agent sees as context.
const AGENT_HISTORY_LIMIT: i64 = 50;

/// Why a conversation landed in the human inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffReason {
    /// The customer explicitly asked for a human.
    HumanIntent,
    /// Agent confidence fell below the configured threshold.
    LowConfidence,
    /// The agent errored, timed out, or returned no usable reply.
    AutomationFailure,
    /// The agent needed a manager fact but no manager can answer queries.
    NoManagerAvailable,
    /// The conversation was already handed off before this message.
    AlreadyHandedOff,
    /// No automated agent is configured.
    NoAgent,
}

/// What the router decided for one inbound message. The caller performs any
/// outward delivery; the store already reflects the decision.
#[derive(Debug)]
pub enum RoutingOutcome {
    /// The agent answered; deliver `text` and call
    /// [`HandoffRouter::record_automated_reply`] once the send succeeds.
    AutomatedReply {
        conversation: Conversation,
        text: String,
    },
    /// The conversation is (now) in human handoff; notify the inbox.
    HumanInbox {
        conversation: Conversation,
        reason: HandoffReason,
    },
    /// An operator holds the lock; deliver straight to them.
    OperatorDelivery {
        conversation: Conversation,
        operator_id: String,
    },
    /// The agent asked a manager; forward `query.summary` to `targets`.
    /// The conversation stays with the agent while the answer is pending.
    ManagerEscalation {
        conversation: Conversation,
        query: ManagerQuery,
        targets: Vec<ManagerNumber>,
    },
    /// The message was stored but the channel credential is not eligible;
    /// nothing can be sent back until verification completes.
    Deferred { conversation: Conversation },
}

/// Routes inbound envelopes through the conversation lifecycle.
pub struct HandoffRouter {
    store: Arc<dyn HandoffStore>,
    agent: Option<Arc<dyn AutomatedAgent>>,
    config: RoutingConfig,
}

impl HandoffRouter {
    pub fn new(
        store: Arc<dyn HandoffStore>,
        agent: Option<Arc<dyn AutomatedAgent>>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            store,
            agent,
            config,
        }
    }

    /// Route one inbound customer message.
    ///
    /// A `StaleState` from the initial persist means another worker moved
    /// the conversation between our read and our write; nothing was stored,
    /// so the routine is retried once against the fresh state.
    pub async fn route_inbound(
        &self,
        envelope: &InboundEnvelope,
    ) -> Result<RoutingOutcome, HandoverError> {
        match self.route_once(envelope).await {
            Err(HandoverError::StaleState { .. }) => {
                debug!(
                    org_id = %envelope.org_id,
                    channel = %envelope.channel,
                    "conversation moved concurrently, retrying route"
                );
                self.route_once(envelope).await
            }
            other => other,
        }
    }

    async fn route_once(
        &self,
        envelope: &InboundEnvelope,
    ) -> Result<RoutingOutcome, HandoverError> {
        let conversation = self
            .store
            .upsert_conversation(&envelope.org_id, envelope.channel, &envelope.customer_id)
            .await?;
        let message = customer_message(&conversation, envelope);

        // A live operator lock always wins: no automated routing while a
        // human is typing.
        if let Some(operator) = conversation.lock_holder(Utc::now()) {
            let operator_id = operator.to_string();
            self.store.append_message(&message).await?;
            return Ok(RoutingOutcome::OperatorDelivery {
                conversation: self.refreshed(conversation).await?,
                operator_id,
            });
        }

        // External channels cannot be answered without an eligible
        // credential. The message is still persisted.
        if envelope.channel != Channel::WebWidget {
            let eligible = self
                .store
                .get_credential(&envelope.org_id, envelope.channel)
                .await?
                .is_some_and(|c| c.is_eligible());
            if !eligible {
                warn!(
                    org_id = %envelope.org_id,
                    channel = %envelope.channel,
                    "inbound on channel without an eligible credential, deferring"
                );
                self.store.append_message(&message).await?;
                return Ok(RoutingOutcome::Deferred {
                    conversation: self.refreshed(conversation).await?,
                });
            }
        }

        if conversation.state == ConversationState::HumanHandoff {
            self.store.append_message(&message).await?;
            return Ok(RoutingOutcome::HumanInbox {
                conversation: self.refreshed(conversation).await?,
                reason: HandoffReason::AlreadyHandedOff,
            });
        }

        // Persist the message and bring the conversation to ai_handling in
        // one transaction. Reopened conversations pass through ai_handling
        // even when the decision below is a handoff.
        if conversation.state == ConversationState::AiHandling {
            self.store.append_message(&message).await?;
        } else {
            self.store
                .append_message_with_transition(
                    &message,
                    conversation.state,
                    ConversationState::AiHandling,
                )
                .await?;
        }

        if let Some(text) = envelope.content.as_text() {
            if matches_human_intent(text) {
                info!(conversation_id = %conversation.id, "explicit human request, handing off");
                return self
                    .hand_off(&conversation.id, HandoffReason::HumanIntent)
                    .await;
            }
        }

        let Some(agent) = self.agent.as_ref() else {
            return self.hand_off(&conversation.id, HandoffReason::NoAgent).await;
        };

        let history = self
            .store
            .list_messages(&conversation.id, Some(AGENT_HISTORY_LIMIT))
            .await?;
        let assessment = match tokio::time::timeout(
            Duration::from_secs(self.config.agent_timeout_secs),
            agent.assess(&conversation, &history, envelope),
        )
        .await
        {
            Ok(Ok(assessment)) => assessment,
            Ok(Err(e)) => {
                warn!(conversation_id = %conversation.id, error = %e, "agent failed, handing off");
                return self
                    .hand_off(&conversation.id, HandoffReason::AutomationFailure)
                    .await;
            }
            Err(_) => {
                warn!(conversation_id = %conversation.id, "agent timed out, handing off");
                return self
                    .hand_off(&conversation.id, HandoffReason::AutomationFailure)
                    .await;
            }
        };

        if let Some((question, summary)) = assessment.manager_question {
            return self.escalate(&conversation, question, summary).await;
        }

        if assessment.confidence < self.config.confidence_threshold {
            info!(
                conversation_id = %conversation.id,
                confidence = assessment.confidence,
                threshold = self.config.confidence_threshold,
                "low agent confidence, handing off"
            );
            return self
                .hand_off(&conversation.id, HandoffReason::LowConfidence)
                .await;
        }

        match assessment.reply {
            Some(text) => Ok(RoutingOutcome::AutomatedReply {
                conversation: self.refreshed(conversation).await?,
                text,
            }),
            // Confident but silent is an agent contract violation; a human
            // should look at it.
            None => {
                self.hand_off(&conversation.id, HandoffReason::AutomationFailure)
                    .await
            }
        }
    }

    /// Record a successfully delivered agent reply: persist it and move the
    /// conversation to `awaiting_user`.
    pub async fn record_automated_reply(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), HandoverError> {
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_kind: SenderKind::AutomatedAgent,
            content: text.to_string(),
            read: true,
            created_at: now_ts(),
        };
        self.store.append_message(&message).await?;
        self.transition_tolerant(
            conversation_id,
            ConversationState::AiHandling,
            ConversationState::AwaitingUser,
        )
        .await
    }

    /// Record a manager's answer being relayed into the conversation as a
    /// manager-sourced reply.
    pub async fn record_manager_relay(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), HandoverError> {
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_kind: SenderKind::ManagerOverride,
            content: text.to_string(),
            read: true,
            created_at: now_ts(),
        };
        self.store.append_message(&message).await?;
        self.transition_tolerant(
            conversation_id,
            ConversationState::AiHandling,
            ConversationState::AwaitingUser,
        )
        .await
    }

    async fn hand_off(
        &self,
        conversation_id: &str,
        reason: HandoffReason,
    ) -> Result<RoutingOutcome, HandoverError> {
        self.transition_tolerant(
            conversation_id,
            ConversationState::AiHandling,
            ConversationState::HumanHandoff,
        )
        .await?;
        let conversation = self.load(conversation_id).await?;
        Ok(RoutingOutcome::HumanInbox {
            conversation,
            reason,
        })
    }

    async fn escalate(
        &self,
        conversation: &Conversation,
        question: String,
        summary: String,
    ) -> Result<RoutingOutcome, HandoverError> {
        let managers = self
            .store
            .list_manager_numbers(&conversation.org_id, true)
            .await?;
        let targets = select_query_targets(managers);
        if targets.is_empty() {
            info!(
                conversation_id = %conversation.id,
                "agent needs a manager fact but none can respond, handing off"
            );
            return self
                .hand_off(&conversation.id, HandoffReason::NoManagerAvailable)
                .await;
        }

        let query = ManagerQuery {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            org_id: conversation.org_id.clone(),
            question,
            summary,
            manager_response: None,
            status: QueryStatus::Pending,
            created_at: now_ts(),
            answered_at: None,
        };
        self.store.create_manager_query(&query).await?;
        info!(
            conversation_id = %conversation.id,
            query_id = %query.id,
            targets = targets.len(),
            "escalated question to managers"
        );
        // The conversation stays in ai_handling while the answer is pending.
        Ok(RoutingOutcome::ManagerEscalation {
            conversation: self.load(&conversation.id).await?,
            query,
            targets,
        })
    }

    /// CAS transition that tolerates losing the race: when the row is no
    /// longer in `from`, the concurrent writer's state stands. The message
    /// this decision was made for is already persisted, so swallowing the
    /// conflict is safe; failing here would retry the whole route and
    /// duplicate the message.
    async fn transition_tolerant(
        &self,
        conversation_id: &str,
        from: ConversationState,
        to: ConversationState,
    ) -> Result<(), HandoverError> {
        match self.store.transition(conversation_id, from, to).await {
            Err(HandoverError::StaleState { actual, .. }) => {
                warn!(
                    conversation_id,
                    %from,
                    %to,
                    %actual,
                    "transition lost a race, keeping concurrent state"
                );
                Ok(())
            }
            other => other,
        }
    }

    async fn load(&self, conversation_id: &str) -> Result<Conversation, HandoverError> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| HandoverError::NotFound(format!("conversation {conversation_id}")))
    }

    async fn refreshed(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, HandoverError> {
        Ok(self
            .store
            .get_conversation(&conversation.id)
            .await?
            .unwrap_or(conversation))
    }
}

/// Pick which managers receive an escalated query: the most recently active
/// number that can respond to queries, or every qualifying number when none
/// has recorded activity yet.
fn select_query_targets(managers: Vec<ManagerNumber>) -> Vec<ManagerNumber> {
    let qualifying: Vec<ManagerNumber> = managers
        .into_iter()
        .filter(|m| m.can_respond_queries)
        .collect();
    let best = qualifying
        .iter()
        .filter(|m| m.last_active_at.is_some())
        .max_by(|a, b| a.last_active_at.cmp(&b.last_active_at));
    match best {
        Some(best) => vec![best.clone()],
        None => qualifying,
    }
}

fn customer_message(conversation: &Conversation, envelope: &InboundEnvelope) -> StoredMessage {
    StoredMessage {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation.id.clone(),
        sender_kind: SenderKind::Customer,
        content: envelope.content.display_text(),
        read: false,
        created_at: envelope
            .received_at
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string(),
    }
}

fn now_ts() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
