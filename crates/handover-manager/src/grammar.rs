// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fixed control-command grammar.
//!
//! Deliberately small: managers text short imperative phrases from a phone,
//! so each intent is one anchored pattern with flexible whitespace and
//! optional trailing punctuation. Anything else is not a command.

use std::sync::LazyLock;

use regex::Regex;

/// A recognized manager control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// "closed today" -- closure override until end of day.
    ClosedToday,
    /// "closing early at TIME" -- closure override with the stated time.
    ClosingEarlyAt(String),
    /// "fully booked" -- capacity override until end of day.
    FullyBooked,
    /// "open" / "reopen" -- clear every active override.
    Reopen,
    /// "status" -- report active overrides and pending queries.
    Status,
    /// "help" -- list the available commands.
    Help,
}

static CLOSED_TODAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(we'?re\s+)?closed\s+(for\s+)?today\s*[.!]*\s*$")
        .expect("grammar pattern is valid")
});

static CLOSING_EARLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*closing\s+early\s+at\s+(?<time>\S[^.!]*?)\s*[.!]*\s*$")
        .expect("grammar pattern is valid")
});

static FULLY_BOOKED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(we'?re\s+)?fully\s+booked\s*[.!]*\s*$")
        .expect("grammar pattern is valid")
});

static REOPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(re)?open\s*[.!]*\s*$").expect("grammar pattern is valid")
});

static STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*status\s*[.!?]*\s*$").expect("grammar pattern is valid"));

static HELP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*help\s*[.!?]*\s*$").expect("grammar pattern is valid"));

/// Parse one manager message against the grammar. `None` means the text is
/// not a control command.
pub fn parse(text: &str) -> Option<Command> {
    if CLOSED_TODAY.is_match(text) {
        return Some(Command::ClosedToday);
    }
    if let Some(caps) = CLOSING_EARLY.captures(text) {
        return Some(Command::ClosingEarlyAt(caps["time"].trim().to_string()));
    }
    if FULLY_BOOKED.is_match(text) {
        return Some(Command::FullyBooked);
    }
    if REOPEN.is_match(text) {
        return Some(Command::Reopen);
    }
    if STATUS.is_match(text) {
        return Some(Command::Status);
    }
    if HELP.is_match(text) {
        return Some(Command::Help);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_today_variants() {
        for text in [
            "closed today",
            "Closed Today",
            "we're closed today!",
            "CLOSED FOR TODAY",
        ] {
            assert_eq!(parse(text), Some(Command::ClosedToday), "{text}");
        }
    }

    #[test]
    fn closing_early_captures_the_time() {
        assert_eq!(
            parse("closing early at 5pm"),
            Some(Command::ClosingEarlyAt("5pm".to_string()))
        );
        assert_eq!(
            parse("Closing early at 17:30."),
            Some(Command::ClosingEarlyAt("17:30".to_string()))
        );
        // Time is required.
        assert_eq!(parse("closing early"), None);
    }

    #[test]
    fn fully_booked_variants() {
        assert_eq!(parse("fully booked"), Some(Command::FullyBooked));
        assert_eq!(parse("We're FULLY BOOKED!"), Some(Command::FullyBooked));
    }

    #[test]
    fn reopen_variants() {
        assert_eq!(parse("open"), Some(Command::Reopen));
        assert_eq!(parse("Reopen"), Some(Command::Reopen));
    }

    #[test]
    fn status_and_help() {
        assert_eq!(parse("STATUS"), Some(Command::Status));
        assert_eq!(parse("status?"), Some(Command::Status));
        assert_eq!(parse("help"), Some(Command::Help));
    }

    #[test]
    fn ordinary_text_is_not_a_command() {
        for text in [
            "yes, we have two tables left tonight",
            "the special is sold out but pasta is fine",
            "closed the kitchen door, all good",
            "I'll be open to ideas",
        ] {
            assert_eq!(parse(text), None, "{text}");
        }
    }
}
