// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temporary override operations.
//!
//! Applying an override supersedes active overrides of the same kind with
//! equal or lower priority in the same transaction, so readers never observe
//! two competing overrides of one kind at the same priority. Expiry is
//! filtered lazily at read time; expired rows are left in place for audit.

use handover_core::HandoverError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_ts};
use crate::models::{TemporaryOverride, parse_field};

fn row_to_override(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemporaryOverride> {
    let kind: String = row.get(2)?;
    Ok(TemporaryOverride {
        id: row.get(0)?,
        org_id: row.get(1)?,
        kind: parse_field(2, &kind)?,
        instruction: row.get(3)?,
        effect: row.get(4)?,
        priority: row.get(5)?,
        expires_at: row.get(6)?,
        active: row.get(7)?,
        created_by: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const SELECT_COLUMNS: &str = "id, org_id, kind, instruction, effect, priority, expires_at,
     active, created_by, created_at";

/// Insert an override, deactivating same-kind overrides of equal or lower
/// priority. Returns the number superseded.
pub async fn apply_override(
    db: &Database,
    override_row: &TemporaryOverride,
) -> Result<u64, HandoverError> {
    let row = override_row.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let superseded = tx.execute(
                "UPDATE temporary_overrides SET active = 0
                 WHERE org_id = ?1 AND kind = ?2 AND active = 1 AND priority <= ?3",
                params![row.org_id, row.kind.to_string(), row.priority],
            )?;
            tx.execute(
                "INSERT INTO temporary_overrides
                     (id, org_id, kind, instruction, effect, priority, expires_at,
                      active, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.id,
                    row.org_id,
                    row.kind.to_string(),
                    row.instruction,
                    row.effect,
                    row.priority,
                    row.expires_at,
                    row.active,
                    row.created_by,
                    row.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(superseded as u64)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Active, unexpired overrides for the organization, highest priority first.
pub async fn list_active_overrides(
    db: &Database,
    org_id: &str,
) -> Result<Vec<TemporaryOverride>, HandoverError> {
    let org_id = org_id.to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM temporary_overrides
                 WHERE org_id = ?1 AND active = 1
                   AND (expires_at IS NULL OR expires_at > ?2)
                 ORDER BY priority DESC, created_at DESC"
            ))?;
            let rows = stmt.query_map(params![org_id, now], row_to_override)?;
            let mut overrides = Vec::new();
            for row in rows {
                overrides.push(row?);
            }
            Ok(overrides)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Deactivate every active override for the organization. Idempotent.
pub async fn deactivate_all_overrides(
    db: &Database,
    org_id: &str,
) -> Result<u64, HandoverError> {
    let org_id = org_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE temporary_overrides SET active = 0 WHERE org_id = ?1 AND active = 1",
                params![org_id],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}
