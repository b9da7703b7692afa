// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Handover engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Handover configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandoverConfig {
    /// Engine identity and behavior settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Webhook/operator gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Business-messaging provider settings.
    #[serde(default)]
    pub business: ProviderConfig,

    /// Social-DM provider settings.
    #[serde(default)]
    pub social: ProviderConfig,

    /// Outbound delivery retry settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Handoff routing settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Credential verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Engine identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Display name of the engine instance.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of dispatch workers. Conversations are sharded across workers
    /// by conversation key, so one conversation is always serialized.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Operator lock TTL in seconds. A dropped operator connection can block
    /// a thread for at most this long.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
            workers: default_workers(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

fn default_engine_name() -> String {
    "handover".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_lock_ttl_secs() -> u64 {
    900
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("handover").join("handover.db"))
        .and_then(|p| p.to_str().map(str::to_string))
        .unwrap_or_else(|| "handover.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Webhook/operator gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for the operator API. `None` rejects all operator
    /// requests (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8787
}

/// Settings for one external messaging provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the provider HTTP API. `None` disables the channel.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Application secret used to validate webhook signatures.
    #[serde(default)]
    pub app_secret: Option<String>,
}

/// Outbound delivery retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Maximum delivery attempts per reply (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff between attempts, in milliseconds.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Backoff cap, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-attempt request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Handoff routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Agent confidence below this threshold hands the conversation to a
    /// human.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Endpoint of the external automated-reply collaborator. `None` routes
    /// every message to human handoff.
    #[serde(default)]
    pub agent_endpoint: Option<String>,

    /// Timeout for one agent assessment, in seconds. Exceeding it is an
    /// automation failure, which falls back to human handoff.
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            agent_endpoint: None,
            agent_timeout_secs: default_agent_timeout_secs(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.55
}

fn default_agent_timeout_secs() -> u64 {
    10
}

/// Credential verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    /// Delay before the automatic probe runs, in seconds. Lets the saving
    /// transaction settle before the provider call.
    #[serde(default = "default_probe_delay_secs")]
    pub probe_delay_secs: u64,

    /// Timeout for one verification probe, in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            probe_delay_secs: default_probe_delay_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_probe_delay_secs() -> u64 {
    2
}

fn default_probe_timeout_secs() -> u64 {
    10
}
