// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Handover engine.
//!
//! Webhook receivers per channel (verify-token challenge + HMAC body
//! signature) and the bearer-gated operator REST API over the conversation
//! store, channel sender, and verification scheduler.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod webhook;

pub use server::{GatewayState, WebhookDelivery, build_router, start_server};
