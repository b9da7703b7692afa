// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod conversations;
pub mod credentials;
pub mod manager_queries;
pub mod managers;
pub mod messages;
pub mod overrides;
