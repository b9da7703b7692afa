// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook payload normalization.
//!
//! Each provider delivers a differently shaped JSON body; normalization maps
//! all of them onto [`InboundEnvelope`]. Unknown message kinds become
//! [`EnvelopeContent::Unsupported`] rather than an error, so a conversation
//! still advances when a provider ships a content type we do not handle.

use chrono::{DateTime, TimeZone, Utc};
use handover_core::HandoverError;
use handover_core::types::{Channel, EnvelopeContent, InboundEnvelope};
use serde_json::Value;

/// Normalize one webhook body into zero or more envelopes.
///
/// Providers batch messages; an empty result (delivery receipts, read
/// events) is not an error. Malformed top-level structure is.
pub fn normalize(
    channel: Channel,
    org_id: &str,
    payload: &Value,
) -> Result<Vec<InboundEnvelope>, HandoverError> {
    match channel {
        Channel::WebWidget => normalize_widget(org_id, payload),
        Channel::BusinessMessaging => normalize_business(org_id, payload),
        Channel::SocialDm => normalize_social(org_id, payload),
    }
}

/// Widget posts a flat body: `{"visitor_id": "...", "text": "...",
/// "display_name": "..."}`.
fn normalize_widget(org_id: &str, payload: &Value) -> Result<Vec<InboundEnvelope>, HandoverError> {
    let visitor_id = payload
        .get("visitor_id")
        .and_then(Value::as_str)
        .ok_or_else(|| HandoverError::Internal("widget payload missing visitor_id".into()))?;
    let content = match payload.get("text").and_then(Value::as_str) {
        Some(text) => EnvelopeContent::Text {
            body: text.to_string(),
        },
        None => EnvelopeContent::Unsupported {
            provider_kind: payload
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        },
    };
    Ok(vec![InboundEnvelope {
        org_id: org_id.to_string(),
        channel: Channel::WebWidget,
        customer_id: visitor_id.to_string(),
        content,
        provider_message_id: payload
            .get("message_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        sender_display_name: payload
            .get("display_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        received_at: Utc::now(),
    }])
}

/// Business-messaging delivery: `entry[].changes[].value.messages[]`, each
/// message carrying `from`, `id`, `type` and a kind-specific object.
/// Contact display names ride alongside in `value.contacts[]`.
fn normalize_business(
    org_id: &str,
    payload: &Value,
) -> Result<Vec<InboundEnvelope>, HandoverError> {
    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| HandoverError::Internal("business payload missing entry array".into()))?;

    let mut envelopes = Vec::new();
    for entry in entries {
        let changes = match entry.get("changes").and_then(Value::as_array) {
            Some(changes) => changes,
            None => continue,
        };
        for change in changes {
            let value = match change.get("value") {
                Some(value) => value,
                None => continue,
            };
            let display_name = value
                .get("contacts")
                .and_then(Value::as_array)
                .and_then(|contacts| contacts.first())
                .and_then(|c| c.pointer("/profile/name"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let messages = match value.get("messages").and_then(Value::as_array) {
                Some(messages) => messages,
                // Status-only deliveries (sent/read receipts) carry no messages.
                None => continue,
            };
            for message in messages {
                let from = match message.get("from").and_then(Value::as_str) {
                    Some(from) => from,
                    None => continue,
                };
                envelopes.push(InboundEnvelope {
                    org_id: org_id.to_string(),
                    channel: Channel::BusinessMessaging,
                    customer_id: from.to_string(),
                    content: business_content(message),
                    provider_message_id: message
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    sender_display_name: display_name.clone(),
                    received_at: epoch_seconds(message.get("timestamp")),
                });
            }
        }
    }
    Ok(envelopes)
}

fn business_content(message: &Value) -> EnvelopeContent {
    let kind = message
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    match kind {
        "text" => match message.pointer("/text/body").and_then(Value::as_str) {
            Some(body) => EnvelopeContent::Text {
                body: body.to_string(),
            },
            None => EnvelopeContent::Unsupported {
                provider_kind: "text".to_string(),
            },
        },
        "image" | "audio" | "video" | "document" | "sticker" => EnvelopeContent::Media {
            media_kind: kind.to_string(),
            url: message
                .pointer(&format!("/{kind}/link"))
                .and_then(Value::as_str)
                .map(str::to_string),
            caption: message
                .pointer(&format!("/{kind}/caption"))
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        "button" => match message.pointer("/button/payload").and_then(Value::as_str) {
            Some(button_payload) => EnvelopeContent::Postback {
                payload: button_payload.to_string(),
            },
            None => EnvelopeContent::Unsupported {
                provider_kind: "button".to_string(),
            },
        },
        other => EnvelopeContent::Unsupported {
            provider_kind: other.to_string(),
        },
    }
}

/// Social-DM delivery: `entry[].messaging[]`, each event carrying
/// `sender.id` plus either a `message` or a `postback` object.
fn normalize_social(org_id: &str, payload: &Value) -> Result<Vec<InboundEnvelope>, HandoverError> {
    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| HandoverError::Internal("social payload missing entry array".into()))?;

    let mut envelopes = Vec::new();
    for entry in entries {
        let events = match entry.get("messaging").and_then(Value::as_array) {
            Some(events) => events,
            None => continue,
        };
        for event in events {
            let sender_id = match event.pointer("/sender/id").and_then(Value::as_str) {
                Some(id) => id,
                None => continue,
            };
            let content = social_content(event);
            let content = match content {
                Some(content) => content,
                // Delivery/read events carry neither message nor postback.
                None => continue,
            };
            envelopes.push(InboundEnvelope {
                org_id: org_id.to_string(),
                channel: Channel::SocialDm,
                customer_id: sender_id.to_string(),
                content,
                provider_message_id: event
                    .pointer("/message/mid")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                sender_display_name: None,
                received_at: epoch_millis(event.get("timestamp")),
            });
        }
    }
    Ok(envelopes)
}

fn social_content(event: &Value) -> Option<EnvelopeContent> {
    if let Some(postback) = event.pointer("/postback/payload").and_then(Value::as_str) {
        return Some(EnvelopeContent::Postback {
            payload: postback.to_string(),
        });
    }
    let message = event.get("message")?;
    if let Some(text) = message.get("text").and_then(Value::as_str) {
        return Some(EnvelopeContent::Text {
            body: text.to_string(),
        });
    }
    if let Some(attachment) = message
        .get("attachments")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    {
        let kind = attachment
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Some(match kind {
            "image" | "audio" | "video" | "file" => EnvelopeContent::Media {
                media_kind: kind.to_string(),
                url: attachment
                    .pointer("/payload/url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                caption: None,
            },
            other => EnvelopeContent::Unsupported {
                provider_kind: other.to_string(),
            },
        });
    }
    Some(EnvelopeContent::Unsupported {
        provider_kind: "unknown".to_string(),
    })
}

fn epoch_seconds(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

fn epoch_millis(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}
