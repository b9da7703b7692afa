// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous channel-credential verification for the Handover engine.

pub mod scheduler;

pub use scheduler::{VerificationHandle, VerificationOutcome, VerificationScheduler};
