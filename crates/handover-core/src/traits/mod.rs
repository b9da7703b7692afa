// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the Handover component seams.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod agent;
pub mod channel;
pub mod store;

pub use adapter::PluginAdapter;
pub use agent::AutomatedAgent;
pub use channel::ChannelConnector;
pub use store::HandoffStore;
