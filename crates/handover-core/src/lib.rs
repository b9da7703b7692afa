// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Handover conversation-handoff engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Handover workspace. Component crates
//! implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HandoverError;
pub use types::{
    AdapterType, Channel, ConversationState, CredentialStatus, HealthStatus, QueryStatus,
    SenderKind,
};

// Re-export the component traits at crate root.
pub use traits::{AutomatedAgent, ChannelConnector, HandoffStore, PluginAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [AdapterType::Channel, AdapterType::Storage, AdapterType::Agent] {
            let s = variant.to_string();
            assert_eq!(AdapterType::from_str(&s).unwrap(), variant);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        // Compile-time check that the component traits are reachable through
        // the public API.
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_channel_connector<T: ChannelConnector>() {}
        fn _assert_store<T: HandoffStore>() {}
        fn _assert_agent<T: AutomatedAgent>() {}
    }
}
