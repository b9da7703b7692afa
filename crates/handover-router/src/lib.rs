// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff routing for the Handover engine.
//!
//! Takes normalized inbound envelopes and drives the conversation
//! lifecycle: automated replies while agent confidence holds, human
//! handoff when it doesn't, and manager escalation when the agent is
//! missing a fact.

pub mod agent_client;
pub mod intent;
pub mod router;

pub use agent_client::HttpAutomatedAgent;
pub use router::{HandoffReason, HandoffRouter, RoutingOutcome};
