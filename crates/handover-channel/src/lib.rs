// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapters for the Handover engine.
//!
//! Normalizes provider webhook payloads into the internal envelope
//! ([`envelope::normalize`]) and delivers outbound replies through
//! per-channel connectors with retry ([`outbound::ChannelSender`]).

pub mod business;
mod classify;
pub mod envelope;
pub mod outbound;
pub mod social;
pub mod widget;

pub use business::BusinessConnector;
pub use outbound::ChannelSender;
pub use social::SocialConnector;
pub use widget::{WidgetConnector, widget_credential};
