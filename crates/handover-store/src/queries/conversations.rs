// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lifecycle operations.
//!
//! State changes are compare-and-swap: the UPDATE carries the expected
//! current state in its WHERE clause, and zero changed rows means the caller
//! lost a race (or the row is gone). Lock acquisition works the same way
//! against the lock columns, comparing RFC 3339 expiry strings directly.

use std::time::Duration;

use chrono::Utc;
use handover_core::HandoverError;
use handover_core::types::{Channel, Conversation, ConversationState, SenderKind};
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_ts};
use crate::models::{StoredMessage, parse_field};

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let channel: String = row.get(2)?;
    let state: String = row.get(4)?;
    Ok(Conversation {
        id: row.get(0)?,
        org_id: row.get(1)?,
        channel: parse_field(2, &channel)?,
        customer_id: row.get(3)?,
        state: parse_field(4, &state)?,
        assigned_operator: row.get(5)?,
        lock_operator: row.get(6)?,
        lock_expires_at: row.get(7)?,
        last_activity_at: row.get(8)?,
        unread_count: row.get(9)?,
        revision: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

const SELECT_COLUMNS: &str = "id, org_id, channel, customer_id, state, assigned_operator,
     lock_operator, lock_expires_at, last_activity_at, unread_count, revision,
     created_at, updated_at";

/// Outcome of a conditional UPDATE, resolved into a domain error by the
/// caller which still owns the un-moved identifiers.
enum CasOutcome {
    Applied,
    Missing,
    Stale(String),
}

/// Outcome of a conditional lock UPDATE.
enum LockOutcome {
    Applied,
    Missing,
    Held(Option<String>, Option<String>),
}

fn read_lock_columns(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<LockOutcome, rusqlite::Error> {
    let result = conn.query_row(
        "SELECT lock_operator, lock_expires_at FROM conversations WHERE id = ?1",
        rusqlite::params![id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    );
    match result {
        Ok((holder, expires)) => Ok(LockOutcome::Held(holder, expires)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(LockOutcome::Missing),
        Err(e) => Err(e),
    }
}

fn resolve_lock(outcome: LockOutcome, id: &str) -> Result<(), HandoverError> {
    match outcome {
        LockOutcome::Applied => Ok(()),
        LockOutcome::Missing => Err(HandoverError::NotFound(format!("conversation {id}"))),
        LockOutcome::Held(holder, expires_at) => Err(HandoverError::LockDenied {
            conversation_id: id.to_string(),
            holder: holder.unwrap_or_else(|| "unknown".to_string()),
            expires_at: expires_at.unwrap_or_default(),
        }),
    }
}

/// Find or create the conversation for `(org, channel, customer)`.
///
/// Insertion races are absorbed by the unique index: whichever insert wins,
/// both callers read back the same row.
pub async fn upsert_conversation(
    db: &Database,
    org_id: &str,
    channel: Channel,
    customer_id: &str,
) -> Result<Conversation, HandoverError> {
    let org_id = org_id.to_string();
    let channel = channel.to_string();
    let customer_id = customer_id.to_string();
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                     (id, org_id, channel, customer_id, state, last_activity_at,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'new', ?5, ?5, ?5)
                 ON CONFLICT (org_id, channel, customer_id) DO NOTHING",
                params![id, org_id, channel, customer_id, now],
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM conversations
                 WHERE org_id = ?1 AND channel = ?2 AND customer_id = ?3"
            ))?;
            stmt.query_row(params![org_id, channel, customer_id], row_to_conversation)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Get a conversation by ID.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, HandoverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM conversations WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_conversation);
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// List an organization's conversations, optionally filtered by state,
/// most recently active first.
pub async fn list_conversations(
    db: &Database,
    org_id: &str,
    state: Option<ConversationState>,
) -> Result<Vec<Conversation>, HandoverError> {
    let org_id = org_id.to_string();
    let state = state.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut conversations = Vec::new();
            match &state {
                Some(state_filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM conversations
                         WHERE org_id = ?1 AND state = ?2
                         ORDER BY last_activity_at DESC"
                    ))?;
                    let rows =
                        stmt.query_map(params![org_id, state_filter], row_to_conversation)?;
                    for row in rows {
                        conversations.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM conversations
                         WHERE org_id = ?1
                         ORDER BY last_activity_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![org_id], row_to_conversation)?;
                    for row in rows {
                        conversations.push(row?);
                    }
                }
            }
            Ok(conversations)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Compare-and-swap state transition. Bumps the revision on success.
pub async fn transition(
    db: &Database,
    id: &str,
    from_expected: ConversationState,
    to: ConversationState,
) -> Result<(), HandoverError> {
    if !from_expected.can_transition_to(to) {
        return Err(HandoverError::InvalidTransition {
            conversation_id: id.to_string(),
            from: from_expected,
            to,
        });
    }
    let id_arg = id.to_string();
    let from_s = from_expected.to_string();
    let to_s = to.to_string();
    let now = now_ts();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<CasOutcome, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE conversations
                 SET state = ?1, revision = revision + 1, updated_at = ?2
                 WHERE id = ?3 AND state = ?4",
                params![to_s, now, id_arg, from_s],
            )?;
            if changed > 0 {
                return Ok(CasOutcome::Applied);
            }
            read_actual_state(conn, &id_arg)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)?;
    resolve_cas(outcome, id, from_expected)
}

/// Acquire the operator lock. Succeeds when the conversation is unlocked or
/// the previous lock's TTL has elapsed; re-acquisition by the current holder
/// refreshes the expiry.
pub async fn acquire_lock(
    db: &Database,
    id: &str,
    operator_id: &str,
    ttl: Duration,
) -> Result<(), HandoverError> {
    let id_arg = id.to_string();
    let operator = operator_id.to_string();
    let now = now_ts();
    let expires = (Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default())
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<LockOutcome, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE conversations
                 SET lock_operator = ?1, lock_expires_at = ?2, updated_at = ?3
                 WHERE id = ?4
                   AND (lock_operator IS NULL
                        OR lock_operator = ?1
                        OR lock_expires_at IS NULL
                        OR lock_expires_at <= ?3)",
                params![operator, expires, now, id_arg],
            )?;
            if changed > 0 {
                return Ok(LockOutcome::Applied);
            }
            read_lock_columns(conn, &id_arg)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)?;
    resolve_lock(outcome, id)
}

/// Release the lock if `operator_id` holds it. Releasing an unlocked
/// conversation is a no-op; releasing another operator's lock is denied.
pub async fn release_lock(
    db: &Database,
    id: &str,
    operator_id: &str,
) -> Result<(), HandoverError> {
    let id_arg = id.to_string();
    let operator = operator_id.to_string();
    let now = now_ts();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<LockOutcome, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE conversations
                 SET lock_operator = NULL, lock_expires_at = NULL, updated_at = ?1
                 WHERE id = ?2 AND (lock_operator IS NULL OR lock_operator = ?3)",
                params![now, id_arg, operator],
            )?;
            if changed > 0 {
                return Ok(LockOutcome::Applied);
            }
            read_lock_columns(conn, &id_arg)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)?;
    resolve_lock(outcome, id)
}

/// Append a message and update the conversation's activity bookkeeping in
/// one transaction. Customer messages bump the unread counter.
pub async fn append_message(
    db: &Database,
    message: &StoredMessage,
) -> Result<(), HandoverError> {
    let message = message.clone();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            insert_message_row(&tx, &message)?;
            touch_conversation(&tx, &message, &now)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Append a message and apply a CAS transition atomically. When the CAS
/// fails the transaction rolls back and the message is not persisted.
pub async fn append_message_with_transition(
    db: &Database,
    message: &StoredMessage,
    from_expected: ConversationState,
    to: ConversationState,
) -> Result<(), HandoverError> {
    if !from_expected.can_transition_to(to) {
        return Err(HandoverError::InvalidTransition {
            conversation_id: message.conversation_id.clone(),
            from: from_expected,
            to,
        });
    }
    let conversation_id = message.conversation_id.clone();
    let message = message.clone();
    let from_s = from_expected.to_string();
    let to_s = to.to_string();
    let now = now_ts();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<CasOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE conversations
                 SET state = ?1, revision = revision + 1, updated_at = ?2
                 WHERE id = ?3 AND state = ?4",
                params![to_s, now, message.conversation_id, from_s],
            )?;
            if changed == 0 {
                // Dropping the transaction rolls it back.
                return read_actual_state(&tx, &message.conversation_id);
            }
            insert_message_row(&tx, &message)?;
            touch_conversation(&tx, &message, &now)?;
            tx.commit()?;
            Ok(CasOutcome::Applied)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)?;
    resolve_cas(outcome, &conversation_id, from_expected)
}

/// Mark every message in the conversation read and reset the unread counter.
pub async fn mark_read(db: &Database, conversation_id: &str) -> Result<(), HandoverError> {
    let conversation_id = conversation_id.to_string();
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE messages SET read = 1 WHERE conversation_id = ?1 AND read = 0",
                params![conversation_id],
            )?;
            tx.execute(
                "UPDATE conversations SET unread_count = 0, updated_at = ?1 WHERE id = ?2",
                params![now, conversation_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Clear every lock whose TTL has elapsed. Returns the number cleared.
pub async fn clear_expired_locks(db: &Database) -> Result<u64, HandoverError> {
    let now = now_ts();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations
                 SET lock_operator = NULL, lock_expires_at = NULL, updated_at = ?1
                 WHERE lock_expires_at IS NOT NULL AND lock_expires_at <= ?1",
                params![now],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

fn insert_message_row(
    tx: &rusqlite::Transaction<'_>,
    message: &StoredMessage,
) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO messages (id, conversation_id, sender_kind, content, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message.id,
            message.conversation_id,
            message.sender_kind.to_string(),
            message.content,
            message.read,
            message.created_at,
        ],
    )?;
    Ok(())
}

fn touch_conversation(
    tx: &rusqlite::Transaction<'_>,
    message: &StoredMessage,
    now: &str,
) -> Result<(), rusqlite::Error> {
    let unread_delta = i64::from(message.sender_kind == SenderKind::Customer);
    tx.execute(
        "UPDATE conversations
         SET last_activity_at = ?1, unread_count = unread_count + ?2, updated_at = ?1
         WHERE id = ?3",
        params![now, unread_delta, message.conversation_id],
    )?;
    Ok(())
}

fn read_actual_state(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<CasOutcome, rusqlite::Error> {
    let actual = conn.query_row(
        "SELECT state FROM conversations WHERE id = ?1",
        params![id],
        |row| row.get::<_, String>(0),
    );
    match actual {
        Ok(state) => Ok(CasOutcome::Stale(state)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(CasOutcome::Missing),
        Err(e) => Err(e),
    }
}

fn resolve_cas(
    outcome: CasOutcome,
    id: &str,
    expected: ConversationState,
) -> Result<(), HandoverError> {
    match outcome {
        CasOutcome::Applied => Ok(()),
        CasOutcome::Missing => Err(HandoverError::NotFound(format!("conversation {id}"))),
        CasOutcome::Stale(actual) => {
            let actual = actual.parse().map_err(|_| {
                HandoverError::Internal(format!(
                    "conversation {id} has unrecognized state `{actual}`"
                ))
            })?;
            Err(HandoverError::StaleState {
                conversation_id: id.to_string(),
                expected,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_message(id: &str, conversation_id: &str, sender: SenderKind) -> StoredMessage {
        StoredMessage {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            sender_kind: sender,
            content: "hello".to_string(),
            read: false,
            created_at: now_ts(),
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_reuses() {
        let (db, _dir) = setup_db().await;

        let first = upsert_conversation(&db, "org-1", Channel::WebWidget, "visitor-1")
            .await
            .unwrap();
        assert_eq!(first.state, ConversationState::New);

        let second = upsert_conversation(&db, "org-1", Channel::WebWidget, "visitor-1")
            .await
            .unwrap();
        assert_eq!(second.id, first.id);

        // Same customer on a different channel is a distinct conversation.
        let other = upsert_conversation(&db, "org-1", Channel::SocialDm, "visitor-1")
            .await
            .unwrap();
        assert_ne!(other.id, first.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_follows_lifecycle() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        transition(&db, &conv.id, ConversationState::New, ConversationState::AiHandling)
            .await
            .unwrap();
        let conv = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(conv.state, ConversationState::AiHandling);
        assert_eq!(conv.revision, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_with_wrong_expectation_is_stale() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();
        transition(&db, &conv.id, ConversationState::New, ConversationState::AiHandling)
            .await
            .unwrap();

        // Caller believes the conversation is still new.
        let err = transition(
            &db,
            &conv.id,
            ConversationState::New,
            ConversationState::AiHandling,
        )
        .await
        .unwrap_err();
        match err {
            HandoverError::StaleState { expected, actual, .. } => {
                assert_eq!(expected, ConversationState::New);
                assert_eq!(actual, ConversationState::AiHandling);
            }
            other => panic!("expected StaleState, got {other}"),
        }

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_rejects_non_lifecycle_edge() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        let err = transition(
            &db,
            &conv.id,
            ConversationState::New,
            ConversationState::Resolved,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HandoverError::InvalidTransition { .. }));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_on_missing_conversation_is_not_found() {
        let (db, _dir) = setup_db().await;
        let err = transition(
            &db,
            "no-such-id",
            ConversationState::New,
            ConversationState::AiHandling,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HandoverError::NotFound(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_released() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();
        let ttl = Duration::from_secs(600);

        acquire_lock(&db, &conv.id, "op-a", ttl).await.unwrap();

        let err = acquire_lock(&db, &conv.id, "op-b", ttl).await.unwrap_err();
        match err {
            HandoverError::LockDenied { holder, .. } => assert_eq!(holder, "op-a"),
            other => panic!("expected LockDenied, got {other}"),
        }

        // Holder can refresh its own lock.
        acquire_lock(&db, &conv.id, "op-a", ttl).await.unwrap();

        release_lock(&db, &conv.id, "op-a").await.unwrap();
        acquire_lock(&db, &conv.id, "op-b", ttl).await.unwrap();

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_can_be_taken_over() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        // Zero TTL expires immediately.
        acquire_lock(&db, &conv.id, "op-a", Duration::from_secs(0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        acquire_lock(&db, &conv.id, "op-b", Duration::from_secs(600))
            .await
            .unwrap();
        let conv = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(conv.lock_operator.as_deref(), Some("op-b"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn release_by_non_holder_is_denied() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();
        acquire_lock(&db, &conv.id, "op-a", Duration::from_secs(600))
            .await
            .unwrap();

        let err = release_lock(&db, &conv.id, "op-b").await.unwrap_err();
        assert!(matches!(err, HandoverError::LockDenied { .. }));

        // Releasing an already-unlocked conversation is a no-op.
        release_lock(&db, &conv.id, "op-a").await.unwrap();
        release_lock(&db, &conv.id, "op-a").await.unwrap();

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn append_updates_unread_and_activity() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        append_message(&db, &make_message("m1", &conv.id, SenderKind::Customer))
            .await
            .unwrap();
        append_message(&db, &make_message("m2", &conv.id, SenderKind::AutomatedAgent))
            .await
            .unwrap();

        let conv = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        // Only the customer message counts as unread.
        assert_eq!(conv.unread_count, 1);

        mark_read(&db, &conv.id).await.unwrap();
        let conv = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(conv.unread_count, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_cas_does_not_persist_the_message() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        // Conversation is in `new`, but the caller expects `ai_handling`.
        let err = append_message_with_transition(
            &db,
            &make_message("m1", &conv.id, SenderKind::Customer),
            ConversationState::AiHandling,
            ConversationState::AwaitingUser,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HandoverError::StaleState { .. }));

        let messages = crate::queries::messages::list_messages(&db, &conv.id, None)
            .await
            .unwrap();
        assert!(messages.is_empty(), "rolled-back message must not persist");
        let conv = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(conv.unread_count, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn successful_cas_appends_and_transitions_together() {
        let (db, _dir) = setup_db().await;
        let conv = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        append_message_with_transition(
            &db,
            &make_message("m1", &conv.id, SenderKind::Customer),
            ConversationState::New,
            ConversationState::AiHandling,
        )
        .await
        .unwrap();

        let conv = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(conv.state, ConversationState::AiHandling);
        assert_eq!(conv.unread_count, 1);
        let messages = crate::queries::messages::list_messages(&db, &conv.id, None)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn clear_expired_locks_only_touches_elapsed_ttls() {
        let (db, _dir) = setup_db().await;
        let expired = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();
        let held = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-2")
            .await
            .unwrap();

        acquire_lock(&db, &expired.id, "op-a", Duration::from_secs(0))
            .await
            .unwrap();
        acquire_lock(&db, &held.id, "op-b", Duration::from_secs(600))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let cleared = clear_expired_locks(&db).await.unwrap();
        assert_eq!(cleared, 1);

        let held = get_conversation(&db, &held.id).await.unwrap().unwrap();
        assert_eq!(held.lock_operator.as_deref(), Some("op-b"));
        let expired = get_conversation(&db, &expired.id).await.unwrap().unwrap();
        assert!(expired.lock_operator.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_by_state() {
        let (db, _dir) = setup_db().await;
        let a = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-1")
            .await
            .unwrap();
        let _b = upsert_conversation(&db, "org-1", Channel::WebWidget, "v-2")
            .await
            .unwrap();
        upsert_conversation(&db, "org-2", Channel::WebWidget, "v-1")
            .await
            .unwrap();

        transition(&db, &a.id, ConversationState::New, ConversationState::AiHandling)
            .await
            .unwrap();

        let all = list_conversations(&db, "org-1", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let ai = list_conversations(&db, "org-1", Some(ConversationState::AiHandling))
            .await
            .unwrap();
        assert_eq!(ai.len(), 1);
        assert_eq!(ai[0].id, a.id);

        db.close().await.unwrap();
    }
}
