// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. All failures are collected rather than failing fast.

use crate::model::HandoverConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or every collected validation
/// message otherwise.
pub fn validate_config(config: &HandoverConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.store.database_path.trim().is_empty() {
        errors.push("store.database_path must not be empty".to_string());
    }

    if config.engine.workers == 0 {
        errors.push("engine.workers must be at least 1".to_string());
    }

    if config.engine.lock_ttl_secs == 0 {
        errors.push("engine.lock_ttl_secs must be at least 1".to_string());
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push("gateway.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    let threshold = config.routing.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(format!(
            "routing.confidence_threshold must be within 0.0..=1.0, got {threshold}"
        ));
    }

    if config.delivery.max_attempts == 0 {
        errors.push("delivery.max_attempts must be at least 1".to_string());
    }

    if config.delivery.base_backoff_ms > config.delivery.max_backoff_ms {
        errors.push(format!(
            "delivery.base_backoff_ms ({}) must not exceed delivery.max_backoff_ms ({})",
            config.delivery.base_backoff_ms, config.delivery.max_backoff_ms
        ));
    }

    // A channel with an API base needs the webhook app secret, otherwise
    // inbound deliveries can never be authenticated.
    for (section, provider) in [("business", &config.business), ("social", &config.social)] {
        if provider.api_base.is_some() && provider.app_secret.is_none() {
            errors.push(format!(
                "{section}.app_secret is required when {section}.api_base is set"
            ));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderConfig;

    #[test]
    fn default_config_is_valid() {
        let config = HandoverConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_is_rejected() {
        let mut config = HandoverConfig::default();
        config.store.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("database_path")));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = HandoverConfig::default();
        config.routing.confidence_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("confidence_threshold")));
    }

    #[test]
    fn provider_without_app_secret_is_rejected() {
        let mut config = HandoverConfig::default();
        config.business = ProviderConfig {
            api_base: Some("https://api.example.com".into()),
            app_secret: None,
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("business.app_secret")));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = HandoverConfig::default();
        config.store.database_path = String::new();
        config.engine.workers = 0;
        config.delivery.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
