// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalated manager query operations.
//!
//! Answering is compare-and-swap on `pending` so that when several managers
//! reply to the same broadcast, exactly one answer is recorded.

use handover_core::HandoverError;
use handover_core::types::QueryStatus;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_ts};
use crate::models::{ManagerQuery, parse_field};

fn row_to_query(row: &rusqlite::Row<'_>) -> rusqlite::Result<ManagerQuery> {
    let status: String = row.get(6)?;
    Ok(ManagerQuery {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        org_id: row.get(2)?,
        question: row.get(3)?,
        summary: row.get(4)?,
        manager_response: row.get(5)?,
        status: parse_field(6, &status)?,
        created_at: row.get(7)?,
        answered_at: row.get(8)?,
    })
}

const SELECT_COLUMNS: &str = "id, conversation_id, org_id, question, summary,
     manager_response, status, created_at, answered_at";

/// Record a new escalated query.
pub async fn create_manager_query(
    db: &Database,
    query: &ManagerQuery,
) -> Result<(), HandoverError> {
    let query = query.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO manager_queries
                     (id, conversation_id, org_id, question, summary, manager_response,
                      status, created_at, answered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    query.id,
                    query.conversation_id,
                    query.org_id,
                    query.question,
                    query.summary,
                    query.manager_response,
                    query.status.to_string(),
                    query.created_at,
                    query.answered_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// The newest pending query for the organization. A manager's free-text
/// reply is matched against this before command parsing.
pub async fn newest_pending_query(
    db: &Database,
    org_id: &str,
) -> Result<Option<ManagerQuery>, HandoverError> {
    let org_id = org_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM manager_queries
                 WHERE org_id = ?1 AND status = 'pending'
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![org_id], row_to_query);
            match result {
                Ok(query) => Ok(Some(query)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// CAS `pending -> answered`. Returns whether this response won; a `false`
/// means another manager answered first.
pub async fn answer_manager_query(
    db: &Database,
    id: &str,
    response: &str,
) -> Result<bool, HandoverError> {
    let id = id.to_string();
    let response = response.to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE manager_queries
                 SET status = 'answered', manager_response = ?1, answered_at = ?2
                 WHERE id = ?3 AND status = 'pending'",
                params![response, now, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Get a query by ID.
pub async fn get_manager_query(
    db: &Database,
    id: &str,
) -> Result<Option<ManagerQuery>, HandoverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM manager_queries WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_query);
            match result {
                Ok(query) => Ok(Some(query)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// List an organization's queries, optionally filtered by status, newest
/// first.
pub async fn list_manager_queries(
    db: &Database,
    org_id: &str,
    status: Option<QueryStatus>,
) -> Result<Vec<ManagerQuery>, HandoverError> {
    let org_id = org_id.to_string();
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut queries = Vec::new();
            match &status {
                Some(status_filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM manager_queries
                         WHERE org_id = ?1 AND status = ?2
                         ORDER BY created_at DESC, id DESC"
                    ))?;
                    let rows = stmt.query_map(params![org_id, status_filter], row_to_query)?;
                    for row in rows {
                        queries.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM manager_queries
                         WHERE org_id = ?1 ORDER BY created_at DESC, id DESC"
                    ))?;
                    let rows = stmt.query_map(params![org_id], row_to_query)?;
                    for row in rows {
                        queries.push(row?);
                    }
                }
            }
            Ok(queries)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// How many queries are still awaiting a manager answer.
pub async fn count_pending_queries(db: &Database, org_id: &str) -> Result<i64, HandoverError> {
    let org_id = org_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM manager_queries WHERE org_id = ?1 AND status = 'pending'",
                params![org_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}
