// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row model re-exports and mapping helpers.
//!
//! The persisted entities live in `handover-core` so every crate shares one
//! definition; this module re-exports them under the store's namespace and
//! provides the text-to-enum conversion used by the row mappers.

pub use handover_core::types::{
    ChannelCredential, Conversation, ManagerNumber, ManagerQuery, StoredMessage,
    TemporaryOverride,
};

/// Parse a TEXT column into a strum-backed enum, reporting failures as a
/// column conversion error so they surface with the column index attached.
pub(crate) fn parse_field<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
