// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Handover engine.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::HandoverConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Returns either a valid [`HandoverConfig`] or the list of error messages.
pub fn load_and_validate() -> Result<HandoverConfig, Vec<String>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(vec![err.to_string()]),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<HandoverConfig, Vec<String>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(vec![err.to_string()]),
    }
}

/// Print config errors to stderr, one per line.
pub fn render_errors(errors: &[String]) {
    for error in errors {
        eprintln!("config error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_validate_str_accepts_valid_config() {
        let config = load_and_validate_str(
            r#"
            [gateway]
            bearer_token = "operator-secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("operator-secret"));
    }

    #[test]
    fn load_and_validate_str_surfaces_validation_errors() {
        let errors = load_and_validate_str(
            r#"
            [routing]
            confidence_threshold = 2.0
            "#,
        )
        .unwrap_err();
        assert!(!errors.is_empty());
    }
}
