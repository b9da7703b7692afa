// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manager command processing for the Handover engine.
//!
//! Messages from registered control numbers become either answers to
//! escalated queries or business-state commands (closures, capacity,
//! status). Answers always take precedence over command parsing.

pub mod grammar;
pub mod processor;

pub use grammar::Command;
pub use processor::{CommandProcessor, ManagerAction, ProcessedMessage};
