// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message read operations. Writes go through the conversation module so the
//! activity bookkeeping cannot be skipped.

use handover_core::HandoverError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{StoredMessage, parse_field};

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let sender: String = row.get(2)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_kind: parse_field(2, &sender)?,
        content: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// List a conversation's messages oldest-first. With a limit, the newest
/// `limit` messages are returned, still oldest-first.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<StoredMessage>, HandoverError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match limit {
                Some(limit) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, sender_kind, content, read, created_at
                         FROM (SELECT id, conversation_id, sender_kind, content, read, created_at
                               FROM messages WHERE conversation_id = ?1
                               ORDER BY created_at DESC, id DESC LIMIT ?2)
                         ORDER BY created_at ASC, id ASC",
                    )?;
                    let rows = stmt.query_map(params![conversation_id, limit], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, sender_kind, content, read, created_at
                         FROM messages WHERE conversation_id = ?1
                         ORDER BY created_at ASC, id ASC",
                    )?;
                    let rows = stmt.query_map(params![conversation_id], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}
