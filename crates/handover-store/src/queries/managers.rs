// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manager number registry operations.

use handover_core::HandoverError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_ts};
use crate::models::ManagerNumber;

fn row_to_manager(row: &rusqlite::Row<'_>) -> rusqlite::Result<ManagerNumber> {
    Ok(ManagerNumber {
        id: row.get(0)?,
        org_id: row.get(1)?,
        phone: row.get(2)?,
        display_name: row.get(3)?,
        role_label: row.get(4)?,
        can_update_hours: row.get(5)?,
        can_respond_queries: row.get(6)?,
        can_view_bookings: row.get(7)?,
        active: row.get(8)?,
        last_active_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const SELECT_COLUMNS: &str = "id, org_id, phone, display_name, role_label, can_update_hours,
     can_respond_queries, can_view_bookings, active, last_active_at, created_at";

/// Register a manager number. One row per `(org, phone)`.
pub async fn create_manager_number(
    db: &Database,
    number: &ManagerNumber,
) -> Result<(), HandoverError> {
    let number = number.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO manager_numbers
                     (id, org_id, phone, display_name, role_label, can_update_hours,
                      can_respond_queries, can_view_bookings, active, last_active_at,
                      created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    number.id,
                    number.org_id,
                    number.phone,
                    number.display_name,
                    number.role_label,
                    number.can_update_hours,
                    number.can_respond_queries,
                    number.can_view_bookings,
                    number.active,
                    number.last_active_at,
                    number.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// List an organization's manager numbers.
pub async fn list_manager_numbers(
    db: &Database,
    org_id: &str,
    active_only: bool,
) -> Result<Vec<ManagerNumber>, HandoverError> {
    let org_id = org_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut numbers = Vec::new();
            if active_only {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM manager_numbers
                     WHERE org_id = ?1 AND active = 1 ORDER BY created_at ASC"
                ))?;
                let rows = stmt.query_map(params![org_id], row_to_manager)?;
                for row in rows {
                    numbers.push(row?);
                }
            } else {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM manager_numbers
                     WHERE org_id = ?1 ORDER BY created_at ASC"
                ))?;
                let rows = stmt.query_map(params![org_id], row_to_manager)?;
                for row in rows {
                    numbers.push(row?);
                }
            }
            Ok(numbers)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Find the manager registered under `phone` for the organization.
/// Inactive numbers are not matched; a deactivated manager loses command
/// access immediately.
pub async fn find_manager_by_phone(
    db: &Database,
    org_id: &str,
    phone: &str,
) -> Result<Option<ManagerNumber>, HandoverError> {
    let org_id = org_id.to_string();
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM manager_numbers
                 WHERE org_id = ?1 AND phone = ?2 AND active = 1"
            ))?;
            let result = stmt.query_row(params![org_id, phone], row_to_manager);
            match result {
                Ok(number) => Ok(Some(number)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Remove a manager number.
pub async fn delete_manager_number(db: &Database, id: &str) -> Result<(), HandoverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM manager_numbers WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Record that the manager just sent or received a message.
pub async fn touch_manager_activity(db: &Database, id: &str) -> Result<(), HandoverError> {
    let id = id.to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE manager_numbers SET last_active_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}
