// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applies messages from registered manager numbers: answers to escalated
//! queries first, then the control-command grammar.
//!
//! Answer precedence is absolute. A manager with a pending query and the
//! respond-to-queries capability is always treated as answering that query,
//! even when the text happens to match a command pattern; a manager replying
//! "HELP" to a question means the literal word, not the help menu.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use handover_core::types::{
    Capability, ManagerNumber, ManagerQuery, OverrideKind, TemporaryOverride,
};
use handover_core::{HandoffStore, HandoverError};

use crate::grammar::{self, Command};

/// Priority of a full-day closure; supersedes partial closures.
const CLOSURE_FULL_DAY_PRIORITY: i64 = 100;
/// Priority of partial closures and capacity overrides.
const DEFAULT_PRIORITY: i64 = 50;

const HELP_TEXT: &str = "Commands: \"closed today\", \"closing early at TIME\", \
\"fully booked\", \"open\" (clear overrides), STATUS, HELP.";

/// What processing one manager message did.
#[derive(Debug)]
pub enum ManagerAction {
    /// The message answered the newest pending query. `customer_reply` is
    /// the formatted text to relay into the originating conversation.
    QueryAnswered {
        query: ManagerQuery,
        customer_reply: String,
    },
    /// Another manager answered the pending query first.
    QueryAlreadyAnswered,
    /// A state-changing command applied an override.
    OverrideApplied {
        applied: TemporaryOverride,
        superseded: u64,
    },
    /// "open" cleared the organization's active overrides.
    OverridesCleared { count: u64 },
    /// Informational command, no state change.
    Status,
    Help,
    /// Well-formed command the sender lacks the capability for. Not applied.
    PermissionDenied { command: Command },
    /// Not an answer and not a command; acknowledged with the help text.
    Unrecognized,
}

/// The processing result: what happened, plus the reply to send back to the
/// manager's number.
#[derive(Debug)]
pub struct ProcessedMessage {
    pub action: ManagerAction,
    pub manager_reply: String,
}

/// Processes inbound messages whose sender matches an active manager number.
pub struct CommandProcessor {
    store: Arc<dyn HandoffStore>,
}

impl CommandProcessor {
    pub fn new(store: Arc<dyn HandoffStore>) -> Self {
        Self { store }
    }

    /// Process one message from `manager`. The caller has already matched
    /// the sender to an active manager number for the organization.
    pub async fn process(
        &self,
        manager: &ManagerNumber,
        text: &str,
    ) -> Result<ProcessedMessage, HandoverError> {
        self.store.touch_manager_activity(&manager.id).await?;

        if manager.has_capability(Capability::RespondToQueries) {
            if let Some(pending) = self.store.newest_pending_query(&manager.org_id).await? {
                return self.answer_query(manager, pending, text).await;
            }
        }

        let Some(command) = grammar::parse(text) else {
            return Ok(ProcessedMessage {
                action: ManagerAction::Unrecognized,
                manager_reply: format!("Sorry, I didn't recognize that. {HELP_TEXT}"),
            });
        };

        if let Some(required) = required_capability(&command) {
            if !manager.has_capability(required) {
                warn!(
                    manager_id = %manager.id,
                    org_id = %manager.org_id,
                    ?command,
                    "manager lacks capability for command"
                );
                return Ok(ProcessedMessage {
                    action: ManagerAction::PermissionDenied { command },
                    manager_reply: "You don't have permission for that command.".to_string(),
                });
            }
        }

        match command {
            Command::ClosedToday => {
                self.apply(
                    manager,
                    text,
                    OverrideKind::Closure,
                    "closed until end of day".to_string(),
                    CLOSURE_FULL_DAY_PRIORITY,
                )
                .await
            }
            Command::ClosingEarlyAt(time) => {
                let effect = format!("closing early at {time}");
                self.apply(manager, text, OverrideKind::Closure, effect, DEFAULT_PRIORITY)
                    .await
            }
            Command::FullyBooked => {
                self.apply(
                    manager,
                    text,
                    OverrideKind::Capacity,
                    "at capacity".to_string(),
                    DEFAULT_PRIORITY,
                )
                .await
            }
            Command::Reopen => {
                let count = self.store.deactivate_all_overrides(&manager.org_id).await?;
                info!(org_id = %manager.org_id, count, "manager cleared overrides");
                Ok(ProcessedMessage {
                    action: ManagerAction::OverridesCleared { count },
                    manager_reply: format!("Reopened. Cleared {count} active override(s)."),
                })
            }
            Command::Status => self.status(manager).await,
            Command::Help => Ok(ProcessedMessage {
                action: ManagerAction::Help,
                manager_reply: HELP_TEXT.to_string(),
            }),
        }
    }

    async fn answer_query(
        &self,
        manager: &ManagerNumber,
        pending: ManagerQuery,
        text: &str,
    ) -> Result<ProcessedMessage, HandoverError> {
        let applied = self.store.answer_manager_query(&pending.id, text).await?;
        if !applied {
            return Ok(ProcessedMessage {
                action: ManagerAction::QueryAlreadyAnswered,
                manager_reply: "Thanks -- that question was already answered.".to_string(),
            });
        }
        info!(
            query_id = %pending.id,
            conversation_id = %pending.conversation_id,
            manager_id = %manager.id,
            "manager answered escalated query"
        );
        let query = self
            .store
            .get_manager_query(&pending.id)
            .await?
            .unwrap_or(pending);
        let customer_reply = format!("Update from {}: {}", manager.display_name, text);
        Ok(ProcessedMessage {
            action: ManagerAction::QueryAnswered {
                query,
                customer_reply,
            },
            manager_reply: "Got it -- passed your answer along to the customer.".to_string(),
        })
    }

    async fn apply(
        &self,
        manager: &ManagerNumber,
        instruction: &str,
        kind: OverrideKind,
        effect: String,
        priority: i64,
    ) -> Result<ProcessedMessage, HandoverError> {
        let override_row = TemporaryOverride {
            id: Uuid::new_v4().to_string(),
            org_id: manager.org_id.clone(),
            kind,
            instruction: instruction.to_string(),
            effect: effect.clone(),
            priority,
            expires_at: end_of_day_utc(),
            active: true,
            created_by: Some(manager.id.clone()),
            created_at: now_ts(),
        };
        let superseded = self.store.apply_override(&override_row).await?;
        info!(
            org_id = %manager.org_id,
            %kind,
            priority,
            superseded,
            "manager applied override"
        );
        Ok(ProcessedMessage {
            action: ManagerAction::OverrideApplied {
                applied: override_row,
                superseded,
            },
            manager_reply: format!("Noted: {effect}."),
        })
    }

    async fn status(&self, manager: &ManagerNumber) -> Result<ProcessedMessage, HandoverError> {
        let overrides = self.store.list_active_overrides(&manager.org_id).await?;
        let pending = self.store.count_pending_queries(&manager.org_id).await?;

        let mut reply = format!("Active overrides: {}", overrides.len());
        for o in &overrides {
            match &o.expires_at {
                Some(expires) => reply.push_str(&format!("\n- {} (until {expires})", o.effect)),
                None => reply.push_str(&format!("\n- {}", o.effect)),
            }
        }
        reply.push_str(&format!("\nPending questions: {pending}"));
        Ok(ProcessedMessage {
            action: ManagerAction::Status,
            manager_reply: reply,
        })
    }
}

fn required_capability(command: &Command) -> Option<Capability> {
    match command {
        Command::ClosedToday
        | Command::ClosingEarlyAt(_)
        | Command::FullyBooked
        | Command::Reopen => Some(Capability::UpdateHours),
        Command::Status => Some(Capability::ViewBookings),
        Command::Help => None,
    }
}

/// End of the current UTC day, as a stored timestamp. Overrides issued
/// without an explicit horizon lapse at midnight.
fn end_of_day_utc() -> Option<String> {
    Utc::now()
        .date_naive()
        .and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

fn now_ts() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
