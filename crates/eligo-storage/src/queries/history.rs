// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History record CRUD operations.

use chrono::Utc;
use eligo_core::{
    EligoError, HistoryKey, HistoryRecord, HistoryUpdate, NewHistoryRecord, TaskStatus,
};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, format_ts, parse_ts};

const COLUMNS: &str = "id, clinic_id, task_id, patient_id, patient_name, patient_mpi,
    date_of_birth, insurance_payer, appointment_id, encounter_id, status,
    polling_attempts, interim_results, result, error, created_at, updated_at, completed_at";

/// A history row as stored, before text columns are parsed.
struct RawHistory {
    id: String,
    clinic_id: String,
    task_id: String,
    patient_id: String,
    patient_name: Option<String>,
    patient_mpi: Option<String>,
    date_of_birth: Option<String>,
    insurance_payer: Option<String>,
    appointment_id: Option<i64>,
    encounter_id: Option<i64>,
    status: String,
    polling_attempts: u32,
    interim_results: Option<String>,
    result: Option<String>,
    error: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl RawHistory {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            clinic_id: row.get(1)?,
            task_id: row.get(2)?,
            patient_id: row.get(3)?,
            patient_name: row.get(4)?,
            patient_mpi: row.get(5)?,
            date_of_birth: row.get(6)?,
            insurance_payer: row.get(7)?,
            appointment_id: row.get(8)?,
            encounter_id: row.get(9)?,
            status: row.get(10)?,
            polling_attempts: row.get(11)?,
            interim_results: row.get(12)?,
            result: row.get(13)?,
            error: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
            completed_at: row.get(17)?,
        })
    }

    fn into_record(self) -> Result<HistoryRecord, EligoError> {
        let status: TaskStatus = self.status.parse().map_err(|_| EligoError::Storage {
            source: format!("unknown status `{}` on history {}", self.status, self.id).into(),
        })?;
        let decode = |id: &str, raw: Option<String>| {
            raw.map(|text| {
                serde_json::from_str::<serde_json::Value>(&text).map_err(|source| {
                    EligoError::Decode {
                        key: id.to_string(),
                        source,
                    }
                })
            })
            .transpose()
        };
        let interim_results = decode(&self.id, self.interim_results)?;
        let result = decode(&self.id, self.result)?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(|raw| parse_ts("completed_at", raw))
            .transpose()?;

        Ok(HistoryRecord {
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            id: self.id,
            clinic_id: self.clinic_id,
            task_id: self.task_id,
            patient_id: self.patient_id,
            patient_name: self.patient_name,
            patient_mpi: self.patient_mpi,
            date_of_birth: self.date_of_birth,
            insurance_payer: self.insurance_payer,
            appointment_id: self.appointment_id,
            encounter_id: self.encounter_id,
            status,
            polling_attempts: self.polling_attempts,
            interim_results,
            result,
            error: self.error,
            completed_at,
        })
    }
}

/// Insert a new record in `pending` with zero attempts. Returns its id.
pub async fn insert(db: &Database, record: &NewHistoryRecord) -> Result<String, EligoError> {
    let record = record.clone();
    let id = uuid::Uuid::new_v4().to_string();
    let now = format_ts(Utc::now());
    let row_id = id.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO history_records (
                     id, clinic_id, task_id, patient_id, patient_name, patient_mpi,
                     date_of_birth, insurance_payer, appointment_id, encounter_id,
                     status, polling_attempts, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', 0, ?11, ?11)",
                params![
                    row_id,
                    record.clinic_id,
                    record.task_id,
                    record.patient_id,
                    record.patient_name,
                    record.patient_mpi,
                    record.date_of_birth,
                    record.insurance_payer,
                    record.appointment_id,
                    record.encounter_id,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(id)
}

/// Fetch one record by its id or its task id.
pub async fn get(db: &Database, key: HistoryKey<'_>) -> Result<Option<HistoryRecord>, EligoError> {
    let (column, value) = key_column(key);
    let sql = format!("SELECT {COLUMNS} FROM history_records WHERE {column} = ?1");
    let raw = db
        .connection()
        .call(move |conn| {
            conn.query_row(&sql, params![value], RawHistory::from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    raw.map(RawHistory::into_record).transpose()
}

/// Apply a partial update. Returns false when no record matched.
pub async fn update(
    db: &Database,
    key: HistoryKey<'_>,
    update: &HistoryUpdate,
) -> Result<bool, EligoError> {
    let (column, value) = key_column(key);
    let encode = |v: &Option<serde_json::Value>| -> Result<Option<String>, EligoError> {
        v.as_ref()
            .map(|v| {
                serde_json::to_string(v).map_err(|e| EligoError::Storage {
                    source: Box::new(e),
                })
            })
            .transpose()
    };
    let status = update.status.map(|s| s.as_str());
    let attempts = update.polling_attempts;
    let interim = encode(&update.interim_results)?;
    let result = encode(&update.result)?;
    let error = update.error.clone();
    let completed_at = update.completed_at.map(format_ts);
    let now = format_ts(Utc::now());

    let sql = format!(
        "UPDATE history_records SET
             status = COALESCE(?1, status),
             polling_attempts = COALESCE(?2, polling_attempts),
             interim_results = COALESCE(?3, interim_results),
             result = COALESCE(?4, result),
             error = COALESCE(?5, error),
             completed_at = COALESCE(?6, completed_at),
             updated_at = ?7
         WHERE {column} = ?8"
    );
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                &sql,
                params![status, attempts, interim, result, error, completed_at, now, value],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(changed > 0)
}

/// Records still in `pending` or `processing`, oldest first.
pub async fn list_active(db: &Database) -> Result<Vec<HistoryRecord>, EligoError> {
    list_where(db, "status IN ('pending', 'processing') ORDER BY created_at ASC").await
}

/// The most recent records for a clinic, newest first.
pub async fn list_recent(
    db: &Database,
    clinic_id: &str,
    limit: u32,
) -> Result<Vec<HistoryRecord>, EligoError> {
    let clinic_id = clinic_id.to_string();
    let sql = format!(
        "SELECT {COLUMNS} FROM history_records WHERE clinic_id = ?1
         ORDER BY created_at DESC LIMIT ?2"
    );
    let raws = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![clinic_id, limit], RawHistory::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    raws.into_iter().map(RawHistory::into_record).collect()
}

async fn list_where(db: &Database, clause: &'static str) -> Result<Vec<HistoryRecord>, EligoError> {
    let sql = format!("SELECT {COLUMNS} FROM history_records WHERE {clause}");
    let raws = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], RawHistory::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    raws.into_iter().map(RawHistory::into_record).collect()
}

fn key_column(key: HistoryKey<'_>) -> (&'static str, String) {
    match key {
        HistoryKey::Record(id) => ("id", id.to_string()),
        HistoryKey::Task(task_id) => ("task_id", task_id.to_string()),
    }
}
