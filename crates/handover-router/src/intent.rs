// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit "talk to a human" intent matching.
//!
//! Deliberately conservative: a match forces a handoff regardless of agent
//! confidence, so only unambiguous requests should match. Softer signals
//! are left to the confidence threshold.

use std::sync::LazyLock;

use regex::Regex;

static HUMAN_INTENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(talk|speak|chat)\s+(to|with)\s+(a\s+|an\s+|the\s+)?(human|person|real\s+person|someone|agent|operator|representative|staff|manager)\b",
        r"(?i)\b(real|live|actual)\s+(human|person|agent)\b",
        r"(?i)\bhuman\s*,?\s*please\b",
        r"(?i)\b(no|stop(\s+the)?|not\s+a)\s+(bot|robot|ai)\b",
        r"(?i)\bcustomer\s+(service|support)\b",
        r"(?i)\btransfer\s+me\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("intent pattern is valid"))
    .collect()
});

/// Whether the message text is an explicit request for a human.
pub fn matches_human_intent(text: &str) -> bool {
    HUMAN_INTENT_PATTERNS.iter().any(|p| p.is_match(text))
}
