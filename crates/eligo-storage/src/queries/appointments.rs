// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Appointment intake marks.

use chrono::Utc;
use eligo_core::EligoError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, format_ts};

/// A live mark as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRow {
    pub state: String,
    pub task_id: Option<String>,
    pub message: Option<String>,
    pub updated_at: String,
}

/// Fetch the live mark for an appointment.
pub async fn get(db: &Database, appointment_id: i64, now: i64) -> Result<Option<MarkRow>, EligoError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT state, task_id, message, updated_at FROM appointment_marks
                 WHERE appointment_id = ?1 AND expires_at > ?2",
                params![appointment_id, now],
                |row| {
                    Ok(MarkRow {
                        state: row.get(0)?,
                        task_id: row.get(1)?,
                        message: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim an appointment for processing.
///
/// Succeeds when there is no live mark or the live mark is `reclaimable_state`.
/// The check and the write run in one transaction, so concurrent claims on
/// the same appointment cannot both succeed.
pub async fn claim(
    db: &Database,
    appointment_id: i64,
    state: &str,
    reclaimable_state: &str,
    now: i64,
    expires_at: i64,
) -> Result<bool, EligoError> {
    let state = state.to_string();
    let reclaimable = reclaimable_state.to_string();
    let updated_at = format_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT state FROM appointment_marks
                     WHERE appointment_id = ?1 AND expires_at > ?2",
                    params![appointment_id, now],
                    |row| row.get(0),
                )
                .optional()?;
            if current.is_some_and(|s| s != reclaimable) {
                return Ok(false);
            }
            tx.execute(
                "INSERT OR REPLACE INTO appointment_marks
                     (appointment_id, state, task_id, message, updated_at, expires_at)
                 VALUES (?1, ?2, NULL, NULL, ?3, ?4)",
                params![appointment_id, state, updated_at, expires_at],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unconditionally set an appointment's mark.
pub async fn set(
    db: &Database,
    appointment_id: i64,
    state: &str,
    task_id: Option<&str>,
    message: Option<&str>,
    expires_at: i64,
) -> Result<(), EligoError> {
    let state = state.to_string();
    let task_id = task_id.map(str::to_string);
    let message = message.map(str::to_string);
    let updated_at = format_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO appointment_marks
                     (appointment_id, state, task_id, message, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![appointment_id, state, task_id, message, updated_at, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete expired marks. Returns the number removed.
pub async fn purge_expired(db: &Database, now: i64) -> Result<usize, EligoError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM appointment_marks WHERE expires_at <= ?1",
                params![now],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
