// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel credential CRUD and the verification status machine.

use handover_core::HandoverError;
use handover_core::types::{Channel, CredentialStatus};
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_ts};
use crate::models::{ChannelCredential, parse_field};

fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelCredential> {
    let channel: String = row.get(2)?;
    let status: String = row.get(6)?;
    Ok(ChannelCredential {
        id: row.get(0)?,
        org_id: row.get(1)?,
        channel: parse_field(2, &channel)?,
        provider_account_id: row.get(3)?,
        access_token: row.get(4)?,
        verify_token: row.get(5)?,
        status: parse_field(6, &status)?,
        active: row.get(7)?,
        error_reason: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const SELECT_COLUMNS: &str = "id, org_id, channel, provider_account_id, access_token,
     verify_token, status, active, error_reason, created_at, updated_at";

/// Insert a credential. One credential per `(org, channel)`; a second insert
/// for the same pair fails on the unique index.
pub async fn create_credential(
    db: &Database,
    credential: &ChannelCredential,
) -> Result<(), HandoverError> {
    let credential = credential.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channel_credentials
                     (id, org_id, channel, provider_account_id, access_token,
                      verify_token, status, active, error_reason, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    credential.id,
                    credential.org_id,
                    credential.channel.to_string(),
                    credential.provider_account_id,
                    credential.access_token,
                    credential.verify_token,
                    credential.status.to_string(),
                    credential.active,
                    credential.error_reason,
                    credential.created_at,
                    credential.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Get the credential for an organization's channel.
pub async fn get_credential(
    db: &Database,
    org_id: &str,
    channel: Channel,
) -> Result<Option<ChannelCredential>, HandoverError> {
    let org_id = org_id.to_string();
    let channel = channel.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM channel_credentials
                 WHERE org_id = ?1 AND channel = ?2"
            ))?;
            let result = stmt.query_row(params![org_id, channel], row_to_credential);
            match result {
                Ok(credential) => Ok(Some(credential)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Get a credential by ID.
pub async fn get_credential_by_id(
    db: &Database,
    id: &str,
) -> Result<Option<ChannelCredential>, HandoverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM channel_credentials WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_credential);
            match result {
                Ok(credential) => Ok(Some(credential)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// List every credential registered for the organization.
pub async fn list_credentials(
    db: &Database,
    org_id: &str,
) -> Result<Vec<ChannelCredential>, HandoverError> {
    let org_id = org_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM channel_credentials
                 WHERE org_id = ?1 ORDER BY channel ASC"
            ))?;
            let rows = stmt.query_map(params![org_id], row_to_credential)?;
            let mut credentials = Vec::new();
            for row in rows {
                credentials.push(row?);
            }
            Ok(credentials)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Update the verification status, optionally compare-and-swap on the
/// current status. Returns whether a row changed; a `false` under CAS means
/// another actor moved the status first.
pub async fn set_credential_status(
    db: &Database,
    id: &str,
    from_expected: Option<CredentialStatus>,
    to: CredentialStatus,
    error_reason: Option<&str>,
) -> Result<bool, HandoverError> {
    let id = id.to_string();
    let from = from_expected.map(|s| s.to_string());
    let to = to.to_string();
    let error_reason = error_reason.map(|s| s.to_string());
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            let changed = match &from {
                Some(from) => conn.execute(
                    "UPDATE channel_credentials
                     SET status = ?1, error_reason = ?2, updated_at = ?3
                     WHERE id = ?4 AND status = ?5",
                    params![to, error_reason, now, id, from],
                )?,
                None => conn.execute(
                    "UPDATE channel_credentials
                     SET status = ?1, error_reason = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![to, error_reason, now, id],
                )?,
            };
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Activate or deactivate a credential without touching its verification
/// status.
pub async fn set_credential_active(
    db: &Database,
    id: &str,
    active: bool,
) -> Result<(), HandoverError> {
    let id = id.to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channel_credentials SET active = ?1, updated_at = ?2 WHERE id = ?3",
                params![active, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Fail every credential stuck in `verifying`. A crash between the
/// verifying CAS and the probe outcome leaves the row in `verifying` with
/// no task to finish it; startup sweeps those into `failed` so operators
/// can retrigger.
pub async fn reset_stale_verifications(db: &Database, reason: &str) -> Result<u64, HandoverError> {
    let reason = reason.to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE channel_credentials
                 SET status = ?1, error_reason = ?2, updated_at = ?3
                 WHERE status = ?4",
                params![
                    CredentialStatus::Failed.to_string(),
                    reason,
                    now,
                    CredentialStatus::Verifying.to_string(),
                ],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Delete a credential.
pub async fn delete_credential(db: &Database, id: &str) -> Result<(), HandoverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM channel_credentials WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}
