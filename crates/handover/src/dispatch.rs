// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch loop: validated webhook deliveries in, routed outcomes out.
//!
//! Deliveries are normalized into envelopes and sharded across a fixed pool
//! of workers by conversation key `(org, channel, customer)`, so messages of
//! one conversation are always processed in order by a single worker while
//! distinct conversations proceed in parallel. All outward sends happen
//! here, after the store already reflects the routing decision.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use handover_channel::{ChannelSender, envelope, widget_credential};
use handover_core::types::{
    Channel, InboundEnvelope, ManagerNumber, OutboundReply, SenderKind,
};
use handover_core::{HandoffStore, HandoverError};
use handover_gateway::WebhookDelivery;
use handover_manager::{CommandProcessor, ManagerAction};
use handover_router::{HandoffRouter, RoutingOutcome};

/// Per-worker envelope queue depth.
const WORKER_QUEUE_DEPTH: usize = 64;

/// Executes routing decisions for normalized envelopes.
pub struct Dispatcher {
    store: Arc<dyn HandoffStore>,
    router: Arc<HandoffRouter>,
    processor: Arc<CommandProcessor>,
    sender: Arc<ChannelSender>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn HandoffStore>,
        router: Arc<HandoffRouter>,
        processor: Arc<CommandProcessor>,
        sender: Arc<ChannelSender>,
    ) -> Self {
        Self {
            store,
            router,
            processor,
            sender,
        }
    }

    /// Process one inbound envelope end to end.
    ///
    /// Business-messaging senders are checked against the organization's
    /// manager numbers first: a manager's message is a command or a query
    /// answer, never a customer conversation.
    pub async fn handle_envelope(&self, env: &InboundEnvelope) -> Result<(), HandoverError> {
        if env.channel == Channel::BusinessMessaging {
            // Only active manager numbers match; a deactivated number is an
            // ordinary customer again.
            if let Some(manager) = self
                .store
                .find_manager_by_phone(&env.org_id, &env.customer_id)
                .await?
            {
                return self.handle_manager_message(&manager, env).await;
            }
        }

        let outcome = self.router.route_inbound(env).await?;
        self.apply_outcome(outcome).await
    }

    async fn handle_manager_message(
        &self,
        manager: &ManagerNumber,
        env: &InboundEnvelope,
    ) -> Result<(), HandoverError> {
        let Some(text) = env.content.as_text() else {
            debug!(
                org_id = %env.org_id,
                manager_id = %manager.id,
                "non-text manager message ignored"
            );
            return Ok(());
        };

        let processed = self.processor.process(manager, text).await?;
        info!(
            org_id = %env.org_id,
            manager_id = %manager.id,
            action = ?processed.action,
            "manager message processed"
        );

        // Acknowledge to the manager's own number. A failed acknowledgement
        // must not block relaying an answer to the waiting customer.
        if let Err(e) = self
            .deliver(
                &env.org_id,
                Channel::BusinessMessaging,
                &manager.phone,
                &processed.manager_reply,
                SenderKind::AutomatedAgent,
            )
            .await
        {
            warn!(manager_id = %manager.id, error = %e, "manager acknowledgement failed");
        }

        if let ManagerAction::QueryAnswered {
            query,
            customer_reply,
        } = processed.action
        {
            let Some(conversation) = self.store.get_conversation(&query.conversation_id).await?
            else {
                warn!(
                    query_id = %query.id,
                    conversation_id = %query.conversation_id,
                    "answered query points at a missing conversation"
                );
                return Ok(());
            };
            self.deliver(
                &conversation.org_id,
                conversation.channel,
                &conversation.customer_id,
                &customer_reply,
                SenderKind::ManagerOverride,
            )
            .await?;
            self.router
                .record_manager_relay(&conversation.id, &customer_reply)
                .await?;
        }
        Ok(())
    }

    async fn apply_outcome(&self, outcome: RoutingOutcome) -> Result<(), HandoverError> {
        match outcome {
            RoutingOutcome::AutomatedReply { conversation, text } => {
                self.deliver(
                    &conversation.org_id,
                    conversation.channel,
                    &conversation.customer_id,
                    &text,
                    SenderKind::AutomatedAgent,
                )
                .await?;
                // Recorded only after the send succeeded; a failed delivery
                // leaves the conversation where the router put it.
                self.router
                    .record_automated_reply(&conversation.id, &text)
                    .await?;
            }
            RoutingOutcome::HumanInbox {
                conversation,
                reason,
            } => {
                info!(
                    conversation_id = %conversation.id,
                    org_id = %conversation.org_id,
                    ?reason,
                    unread = conversation.unread_count,
                    "conversation waiting in the human inbox"
                );
            }
            RoutingOutcome::OperatorDelivery {
                conversation,
                operator_id,
            } => {
                debug!(
                    conversation_id = %conversation.id,
                    operator_id = operator_id.as_str(),
                    "locked conversation, message visible to the operator via the api"
                );
            }
            RoutingOutcome::ManagerEscalation {
                conversation,
                query,
                targets,
            } => {
                let text = format!(
                    "Customer question: {} Reply with the answer.",
                    query.summary
                );
                for target in &targets {
                    if let Err(e) = self
                        .deliver(
                            &conversation.org_id,
                            Channel::BusinessMessaging,
                            &target.phone,
                            &text,
                            SenderKind::AutomatedAgent,
                        )
                        .await
                    {
                        warn!(
                            query_id = %query.id,
                            manager_id = %target.id,
                            error = %e,
                            "escalation delivery to manager failed"
                        );
                    }
                }
            }
            RoutingOutcome::Deferred { conversation } => {
                debug!(
                    conversation_id = %conversation.id,
                    "message stored, channel credential not yet eligible for replies"
                );
            }
        }
        Ok(())
    }

    /// Deliver `text` through the channel's connector. The widget carries a
    /// synthetic always-eligible credential; external channels use the
    /// organization's stored one.
    async fn deliver(
        &self,
        org_id: &str,
        channel: Channel,
        customer_id: &str,
        text: &str,
        sender: SenderKind,
    ) -> Result<String, HandoverError> {
        let credential = match channel {
            Channel::WebWidget => widget_credential(org_id),
            _ => self
                .store
                .get_credential(org_id, channel)
                .await?
                .ok_or_else(|| HandoverError::ChannelSend {
                    code: "no_credential".to_string(),
                    message: format!("no {channel} credential for org {org_id}"),
                })?,
        };
        let reply = OutboundReply {
            org_id: org_id.to_string(),
            channel,
            customer_id: customer_id.to_string(),
            text: text.to_string(),
            sender,
        };
        self.sender.send(&reply, &credential).await
    }
}

/// Spawn the fan-out task and its worker pool. The returned handle resolves
/// once the delivery channel closes and every worker has drained.
pub fn spawn(
    dispatcher: Arc<Dispatcher>,
    workers: usize,
    mut deliveries: mpsc::Receiver<WebhookDelivery>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let workers = workers.max(1);
    tokio::spawn(async move {
        let mut worker_txs = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (tx, rx) = mpsc::channel::<InboundEnvelope>(WORKER_QUEUE_DEPTH);
            worker_txs.push(tx);
            handles.push(tokio::spawn(run_worker(worker, dispatcher.clone(), rx)));
        }

        loop {
            let delivery = tokio::select! {
                delivery = deliveries.recv() => delivery,
                _ = cancel.cancelled() => None,
            };
            let Some(delivery) = delivery else { break };

            let envelopes =
                match envelope::normalize(delivery.channel, &delivery.org_id, &delivery.payload) {
                    Ok(envelopes) => envelopes,
                    Err(e) => {
                        warn!(
                            org_id = %delivery.org_id,
                            channel = %delivery.channel,
                            error = %e,
                            "webhook payload rejected during normalization"
                        );
                        continue;
                    }
                };
            for env in envelopes {
                let shard = conversation_shard(&env, worker_txs.len());
                if worker_txs[shard].send(env).await.is_err() {
                    error!(shard, "dispatch worker gone, dropping envelope");
                }
            }
        }

        // Closing the worker channels lets each worker drain and exit.
        drop(worker_txs);
        for handle in handles {
            let _ = handle.await;
        }
        info!("dispatch workers stopped");
    })
}

async fn run_worker(
    worker: usize,
    dispatcher: Arc<Dispatcher>,
    mut envelopes: mpsc::Receiver<InboundEnvelope>,
) {
    while let Some(env) = envelopes.recv().await {
        if let Err(e) = dispatcher.handle_envelope(&env).await {
            error!(
                worker,
                org_id = %env.org_id,
                channel = %env.channel,
                error = %e,
                "dispatch failed"
            );
        }
    }
}

/// Stable worker index for an envelope's conversation key.
fn conversation_shard(env: &InboundEnvelope, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    env.org_id.hash(&mut hasher);
    env.channel.hash(&mut hasher);
    env.customer_id.hash(&mut hasher);
    (hasher.finish() as usize) % workers
}
