// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task metadata and secondary index rows.
//!
//! Expiry is stored as unix milliseconds. A row whose `expires_at` is not in
//! the future is treated as absent by every read.

use chrono::{DateTime, Utc};
use eligo_core::{EligoError, IndexKind, TaskMetadata, TaskStatus};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

/// Result of a conditional status rewrite.
#[derive(Debug)]
pub enum StatusWrite {
    /// No live record for the task.
    Missing,
    /// The transition would move backwards or leave a terminal status.
    Rejected { current: TaskStatus },
    /// The stored payload could not be decoded.
    Undecodable(serde_json::Error),
    Updated,
}

/// Insert or replace a record and its index memberships in one transaction.
///
/// Every index set the record touches gets its expiry pushed to `expires_at`.
pub async fn put(
    db: &Database,
    metadata: &TaskMetadata,
    expires_at: i64,
) -> Result<(), EligoError> {
    let payload = serde_json::to_string(metadata).map_err(|e| EligoError::Storage {
        source: Box::new(e),
    })?;
    let task_id = metadata.task_id.clone();
    let created_at = metadata.created_at.timestamp_millis();
    let entries = metadata.index_entries();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO task_metadata (task_id, payload, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(task_id) DO UPDATE SET
                     payload = excluded.payload,
                     created_at = excluded.created_at,
                     expires_at = excluded.expires_at",
                params![task_id, payload, created_at, expires_at],
            )?;
            tx.execute("DELETE FROM task_index WHERE task_id = ?1", params![task_id])?;
            for (kind, value) in &entries {
                tx.execute(
                    "INSERT INTO task_index (kind, value, task_id, expires_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![kind.as_str(), value, task_id, expires_at],
                )?;
                tx.execute(
                    "UPDATE task_index SET expires_at = ?3 WHERE kind = ?1 AND value = ?2",
                    params![kind.as_str(), value, expires_at],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch the raw payload of a live record.
pub async fn get_payload(
    db: &Database,
    task_id: &str,
    now: i64,
) -> Result<Option<String>, EligoError> {
    let task_id = task_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT payload FROM task_metadata WHERE task_id = ?1 AND expires_at > ?2",
                params![task_id, now],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite a record's status if the transition is allowed, refreshing the
/// expiry of the record and of every index set it belongs to.
pub async fn update_status(
    db: &Database,
    task_id: &str,
    status: TaskStatus,
    completed_at: Option<DateTime<Utc>>,
    now: i64,
    expires_at: i64,
) -> Result<StatusWrite, EligoError> {
    let task_id = task_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let payload: Option<String> = tx
                .query_row(
                    "SELECT payload FROM task_metadata WHERE task_id = ?1 AND expires_at > ?2",
                    params![task_id, now],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(payload) = payload else {
                return Ok(StatusWrite::Missing);
            };
            let mut record: TaskMetadata = match serde_json::from_str(&payload) {
                Ok(record) => record,
                Err(e) => return Ok(StatusWrite::Undecodable(e)),
            };
            if !record.status.can_transition_to(status) {
                return Ok(StatusWrite::Rejected {
                    current: record.status,
                });
            }

            record.status = status;
            if completed_at.is_some() {
                record.completed_at = completed_at;
            }
            let payload = serde_json::to_string(&record)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            tx.execute(
                "UPDATE task_metadata SET payload = ?2, expires_at = ?3 WHERE task_id = ?1",
                params![task_id, payload, expires_at],
            )?;
            tx.execute(
                "UPDATE task_index SET expires_at = ?2
                 WHERE (kind, value) IN (SELECT kind, value FROM task_index WHERE task_id = ?1)",
                params![task_id, expires_at],
            )?;
            tx.commit()?;
            Ok(StatusWrite::Updated)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Live `(task_id, payload)` pairs referenced by one index set, newest first.
///
/// Index rows pointing at missing or expired records are skipped.
pub async fn find_payloads(
    db: &Database,
    kind: IndexKind,
    value: &str,
    now: i64,
) -> Result<Vec<(String, String)>, EligoError> {
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.task_id, m.payload
                 FROM task_index i
                 JOIN task_metadata m ON m.task_id = i.task_id
                 WHERE i.kind = ?1 AND i.value = ?2
                   AND i.expires_at > ?3 AND m.expires_at > ?3
                 ORDER BY m.created_at DESC, m.task_id ASC",
            )?;
            let rows = stmt.query_map(params![kind.as_str(), value, now], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a record and its index memberships. Returns whether a record row existed.
pub async fn delete(db: &Database, task_id: &str) -> Result<bool, EligoError> {
    let task_id = task_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM task_metadata WHERE task_id = ?1",
                params![task_id],
            )?;
            tx.execute("DELETE FROM task_index WHERE task_id = ?1", params![task_id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every expired record and index row. Returns the number of rows removed.
pub async fn purge_expired(db: &Database, now: i64) -> Result<usize, EligoError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let records = tx.execute(
                "DELETE FROM task_metadata WHERE expires_at <= ?1",
                params![now],
            )?;
            let index_rows =
                tx.execute("DELETE FROM task_index WHERE expires_at <= ?1", params![now])?;
            tx.commit()?;
            Ok(records + index_rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
