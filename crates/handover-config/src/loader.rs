// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./handover.toml` > `~/.config/handover/handover.toml`
//! > `/etc/handover/handover.toml` with environment variable overrides via
//! the `HANDOVER_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HandoverConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/handover/handover.toml` (system-wide)
/// 3. `~/.config/handover/handover.toml` (user XDG config)
/// 4. `./handover.toml` (local directory)
/// 5. `HANDOVER_*` environment variables
pub fn load_config() -> Result<HandoverConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoverConfig::default()))
        .merge(Toml::file("/etc/handover/handover.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("handover/handover.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("handover.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<HandoverConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoverConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HandoverConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoverConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `HANDOVER_GATEWAY_BEARER_TOKEN` must map
/// to `gateway.bearer_token`, not `gateway.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("HANDOVER_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: HANDOVER_GATEWAY_BEARER_TOKEN -> "gateway_bearer_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("store_", "store.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("business_", "business.", 1)
            .replacen("social_", "social.", 1)
            .replacen("delivery_", "delivery.", 1)
            .replacen("routing_", "routing.", 1)
            .replacen("verification_", "verification.", 1);
        mapped.into()
    })
}
