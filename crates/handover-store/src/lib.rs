// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Handover engine.
//!
//! Provides the [`SqliteStore`] adapter implementing
//! [`handover_core::HandoffStore`], backed by a single async connection with
//! WAL journaling and embedded refinery migrations.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
