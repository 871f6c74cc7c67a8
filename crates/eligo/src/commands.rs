// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands: `check`, `lookup`, and `status`.

use std::io::Write;

use eligo_config::EligoConfig;
use eligo_core::{EligoError, HistoryRecord, HistoryStore, IndexKind, TaskMetadata};
use eligo_storage::SqliteHistoryStore;
use serde::Serialize;

use crate::context::{AppContext, metadata_store, open_database};
use crate::serve::init_tracing;

/// Run a single intake pass and print its metrics as JSON.
///
/// Tasks created by the pass stay `pending` in history and are picked up by
/// the next `eligo serve`.
pub async fn run_check(config: &EligoConfig) -> Result<(), EligoError> {
    init_tracing(&config.service.log_level);
    let ctx = AppContext::open(config).await?;
    let checker = ctx.checker(config);
    let result = checker.run_once().await;
    ctx.tracker.scheduler().shutdown().await;
    print_json(&result?)
}

/// Print the metadata records indexed under `kind = value`, newest first.
/// With `latest`, print only the newest completed record for a subject.
pub async fn run_lookup(
    config: &EligoConfig,
    kind: IndexKind,
    value: &str,
    latest: bool,
) -> Result<(), EligoError> {
    let metadata = metadata_store(config, open_database(config).await?);
    let records: Vec<TaskMetadata> = if latest {
        if kind != IndexKind::Subject {
            return Err(EligoError::Config(
                "--latest only applies to subject lookups".to_string(),
            ));
        }
        metadata.latest_completed_by(value).await?.into_iter().collect()
    } else {
        metadata.find_by(kind, value).await?
    };
    print_json(&records)
}

#[derive(Serialize)]
struct StatusSummary<'a> {
    active: usize,
    tasks: Vec<ActiveTask<'a>>,
}

#[derive(Serialize)]
struct ActiveTask<'a> {
    task_id: &'a str,
    patient_id: &'a str,
    status: &'a str,
    polling_attempts: u32,
    insurance_payer: Option<&'a str>,
    created_at: String,
}

impl<'a> From<&'a HistoryRecord> for ActiveTask<'a> {
    fn from(record: &'a HistoryRecord) -> Self {
        Self {
            task_id: &record.task_id,
            patient_id: &record.patient_id,
            status: record.status.as_str(),
            polling_attempts: record.polling_attempts,
            insurance_payer: record.insurance_payer.as_deref(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// List history records still pending or processing.
pub async fn run_status(config: &EligoConfig, json: bool) -> Result<(), EligoError> {
    let history = SqliteHistoryStore::new(open_database(config).await?);
    let records = history.list_active().await?;

    if json {
        return print_json(&StatusSummary {
            active: records.len(),
            tasks: records.iter().map(ActiveTask::from).collect(),
        });
    }

    println!("{} active task(s)", records.len());
    for record in &records {
        println!("{}", format_active(record));
    }
    Ok(())
}

fn format_active(record: &HistoryRecord) -> String {
    format!(
        "  {:<36}  {:<10}  attempts={:<4} payer={:<8} since {}",
        record.task_id,
        record.status.as_str(),
        record.polling_attempts,
        record.insurance_payer.as_deref().unwrap_or("-"),
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<(), EligoError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| EligoError::Internal(format!("failed to serialize output: {e}")))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")
        .map_err(|e| EligoError::Internal(format!("failed to write output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eligo_core::TaskStatus;

    fn record() -> HistoryRecord {
        let now = Utc::now();
        HistoryRecord {
            id: "r1".into(),
            clinic_id: "c1".into(),
            task_id: "task-abc".into(),
            patient_id: "P-1".into(),
            patient_name: None,
            patient_mpi: None,
            date_of_birth: None,
            insurance_payer: Some("TPA001".into()),
            appointment_id: None,
            encounter_id: None,
            status: TaskStatus::Processing,
            polling_attempts: 12,
            interim_results: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn active_task_row() {
        let line = format_active(&record());
        assert!(line.contains("task-abc"));
        assert!(line.contains("processing"));
        assert!(line.contains("attempts=12"));
        assert!(line.contains("payer=TPA001"));
    }

    #[test]
    fn status_summary_json() {
        let record = record();
        let summary = StatusSummary {
            active: 1,
            tasks: vec![ActiveTask::from(&record)],
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["active"], 1);
        assert_eq!(value["tasks"][0]["status"], "processing");
        assert_eq!(value["tasks"][0]["polling_attempts"], 12);
    }
}
