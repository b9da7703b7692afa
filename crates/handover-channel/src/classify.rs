// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider HTTP failure classification shared by the connectors.
//!
//! Rate limits and server errors are retryable; everything else from the
//! provider is a permanent rejection that must reach the router unchanged.

use handover_core::HandoverError;
use reqwest::StatusCode;

/// Classify a non-success provider response.
pub(crate) fn classify_status(status: StatusCode, body: String) -> HandoverError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        HandoverError::Transient {
            message: format!("provider returned {status}: {body}"),
            source: None,
        }
    } else {
        HandoverError::ChannelSend {
            code: status.as_u16().to_string(),
            message: body,
        }
    }
}

/// Transport-level failures (timeouts, connection resets, DNS) are always
/// retryable.
pub(crate) fn map_request_error(e: reqwest::Error) -> HandoverError {
    HandoverError::Transient {
        message: format!("provider request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = classify_status(StatusCode::UNAUTHORIZED, "bad token".to_string());
        assert!(!err.is_transient());
        match err {
            HandoverError::ChannelSend { code, message } => {
                assert_eq!(code, "401");
                assert_eq!(message, "bad token");
            }
            other => panic!("expected ChannelSend, got {other}"),
        }

        let invalid_recipient = classify_status(StatusCode::BAD_REQUEST, "unknown recipient".into());
        assert!(matches!(invalid_recipient, HandoverError::ChannelSend { .. }));
    }
}
