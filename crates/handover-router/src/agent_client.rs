// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external automated-reply collaborator.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use handover_config::model::RoutingConfig;
use handover_core::types::{AgentAssessment, Conversation, InboundEnvelope, StoredMessage};
use handover_core::{AutomatedAgent, HandoverError};

/// Agent backed by an HTTP assessment endpoint.
///
/// The collaborator receives the conversation, recent history, and the new
/// message, and answers with a confidence score, an optional drafted reply,
/// and an optional manager-fact request.
pub struct HttpAutomatedAgent {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct AssessRequest<'a> {
    conversation: &'a Conversation,
    history: &'a [StoredMessage],
    message: &'a InboundEnvelope,
}

#[derive(Deserialize)]
struct AssessResponse {
    confidence: f64,
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    manager_question: Option<ManagerQuestion>,
}

#[derive(Deserialize)]
struct ManagerQuestion {
    question: String,
    summary: String,
}

impl HttpAutomatedAgent {
    /// Build the agent client. Requires `routing.agent_endpoint` to be
    /// configured.
    pub fn new(routing: &RoutingConfig) -> Result<Self, HandoverError> {
        let endpoint = routing.agent_endpoint.clone().ok_or_else(|| {
            HandoverError::Config("routing.agent_endpoint is required for the agent client".into())
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(routing.agent_timeout_secs))
            .build()
            .map_err(|e| HandoverError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl AutomatedAgent for HttpAutomatedAgent {
    async fn assess(
        &self,
        conversation: &Conversation,
        history: &[StoredMessage],
        inbound: &InboundEnvelope,
    ) -> Result<AgentAssessment, HandoverError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&AssessRequest {
                conversation,
                history,
                message: inbound,
            })
            .send()
            .await
            .map_err(|e| HandoverError::Transient {
                message: format!("agent request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandoverError::Transient {
                message: format!("agent returned {status}"),
                source: None,
            });
        }

        let body: AssessResponse = response.json().await.map_err(|e| HandoverError::Transient {
            message: format!("agent response malformed: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(
            conversation_id = %conversation.id,
            confidence = body.confidence,
            "agent assessment received"
        );
        Ok(AgentAssessment {
            confidence: body.confidence,
            reply: body.reply,
            manager_question: body.manager_question.map(|q| (q.question, q.summary)),
        })
    }
}
