// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clinic TPA configuration rows.

use eligo_core::{EligoError, TpaConfig};
use rusqlite::params;

use crate::database::Database;

/// Insert or replace a clinic's configuration for one insurance code.
pub async fn upsert(db: &Database, config: &TpaConfig) -> Result<(), EligoError> {
    let config = config.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tpa_configs (clinic_id, ins_code, insurance_name, tpa_name, ins_payer)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(clinic_id, ins_code) DO UPDATE SET
                     insurance_name = excluded.insurance_name,
                     tpa_name = excluded.tpa_name,
                     ins_payer = excluded.ins_payer",
                params![
                    config.clinic_id,
                    config.ins_code,
                    config.insurance_name,
                    config.tpa_name,
                    config.ins_payer,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every configuration stored for a clinic, ordered by insurance code.
pub async fn list_for_clinic(db: &Database, clinic_id: &str) -> Result<Vec<TpaConfig>, EligoError> {
    let clinic_id = clinic_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT clinic_id, ins_code, insurance_name, tpa_name, ins_payer
                 FROM tpa_configs WHERE clinic_id = ?1 ORDER BY ins_code",
            )?;
            let rows = stmt.query_map(params![clinic_id], |row| {
                Ok(TpaConfig {
                    clinic_id: row.get(0)?,
                    ins_code: row.get(1)?,
                    insurance_name: row.get(2)?,
                    tpa_name: row.get(3)?,
                    ins_payer: row.get(4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete one configuration. Returns whether a row existed.
pub async fn delete(db: &Database, clinic_id: &str, ins_code: &str) -> Result<bool, EligoError> {
    let clinic_id = clinic_id.to_string();
    let ins_code = ins_code.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM tpa_configs WHERE clinic_id = ?1 AND ins_code = ?2",
                params![clinic_id, ins_code],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
