// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementations of the history store and TPA configuration traits.

use async_trait::async_trait;
use tracing::debug;

use eligo_core::{
    EligoError, HistoryKey, HistoryRecord, HistoryStore, HistoryUpdate, NewHistoryRecord,
    TpaConfig, TpaConfigSource,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed history store.
///
/// Shares the [`Database`] handle (and so the single writer thread) with the
/// metadata store.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    db: Database,
}

impl SqliteHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The most recent records for a clinic, newest first.
    pub async fn list_recent(
        &self,
        clinic_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryRecord>, EligoError> {
        queries::history::list_recent(&self.db, clinic_id, limit).await
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn create(&self, record: NewHistoryRecord) -> Result<String, EligoError> {
        let id = queries::history::insert(&self.db, &record).await?;
        debug!(history_id = %id, task_id = %record.task_id, "history record created");
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<HistoryRecord>, EligoError> {
        queries::history::get(&self.db, HistoryKey::Record(id)).await
    }

    async fn get_by_task_id(&self, task_id: &str) -> Result<Option<HistoryRecord>, EligoError> {
        queries::history::get(&self.db, HistoryKey::Task(task_id)).await
    }

    async fn update(&self, key: HistoryKey<'_>, update: HistoryUpdate) -> Result<(), EligoError> {
        if queries::history::update(&self.db, key, &update).await? {
            Ok(())
        } else {
            let (kind, id) = match key {
                HistoryKey::Record(id) => ("history record", id),
                HistoryKey::Task(id) => ("history record for task", id),
            };
            Err(EligoError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })
        }
    }

    async fn list_active(&self) -> Result<Vec<HistoryRecord>, EligoError> {
        queries::history::list_active(&self.db).await
    }
}

/// SQLite-backed clinic TPA configuration source.
#[derive(Clone)]
pub struct SqliteTpaConfigs {
    db: Database,
}

impl SqliteTpaConfigs {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, config: &TpaConfig) -> Result<(), EligoError> {
        queries::tpa_configs::upsert(&self.db, config).await
    }

    pub async fn remove(&self, clinic_id: &str, ins_code: &str) -> Result<bool, EligoError> {
        queries::tpa_configs::delete(&self.db, clinic_id, ins_code).await
    }
}

#[async_trait]
impl TpaConfigSource for SqliteTpaConfigs {
    async fn tpa_configs(&self, clinic_id: &str) -> Result<Vec<TpaConfig>, EligoError> {
        queries::tpa_configs::list_for_clinic(&self.db, clinic_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eligo_core::TaskStatus;
    use serde_json::json;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn new_record(task_id: &str) -> NewHistoryRecord {
        NewHistoryRecord {
            clinic_id: "clinic-1".to_string(),
            task_id: task_id.to_string(),
            patient_id: "P-100".to_string(),
            patient_name: Some("Jane Roe".to_string()),
            patient_mpi: Some("MPI-100".to_string()),
            date_of_birth: Some("1990-01-01".to_string()),
            insurance_payer: Some("TPA001".to_string()),
            appointment_id: Some(5001),
            encounter_id: None,
        }
    }

    #[tokio::test]
    async fn create_then_fetch_by_either_key() {
        let (db, _dir) = setup_db().await;
        let store = SqliteHistoryStore::new(db);

        let id = store.create(new_record("task-1")).await.unwrap();
        let by_id = store.get_by_id(&id).await.unwrap().unwrap();
        let by_task = store.get_by_task_id("task-1").await.unwrap().unwrap();

        assert_eq!(by_id, by_task);
        assert_eq!(by_id.status, TaskStatus::Pending);
        assert_eq!(by_id.polling_attempts, 0);
        assert_eq!(by_id.appointment_id, Some(5001));
        assert!(by_id.completed_at.is_none());
        assert!(store.get_by_task_id("task-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let (db, _dir) = setup_db().await;
        let store = SqliteHistoryStore::new(db);
        let id = store.create(new_record("task-1")).await.unwrap();

        let mut progress = HistoryUpdate::progress(TaskStatus::Processing, 3);
        progress.interim_results = Some(json!({"screenshot": "s3://shot.png"}));
        store
            .update(HistoryKey::Task("task-1"), progress)
            .await
            .unwrap();

        let done = Utc::now();
        store
            .update(
                HistoryKey::Record(&id),
                HistoryUpdate {
                    status: Some(TaskStatus::Complete),
                    polling_attempts: Some(4),
                    result: Some(json!({"eligible": true})),
                    completed_at: Some(done),
                    ..HistoryUpdate::default()
                },
            )
            .await
            .unwrap();

        let record = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Complete);
        assert_eq!(record.polling_attempts, 4);
        assert_eq!(
            record.interim_results,
            Some(json!({"screenshot": "s3://shot.png"}))
        );
        assert_eq!(record.result, Some(json!({"eligible": true})));
        assert_eq!(
            record.completed_at.map(|t| t.timestamp_millis()),
            Some(done.timestamp_millis())
        );
        assert_eq!(record.patient_name.as_deref(), Some("Jane Roe"));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let (db, _dir) = setup_db().await;
        let store = SqliteHistoryStore::new(db);
        let err = store
            .update(
                HistoryKey::Task("ghost"),
                HistoryUpdate::progress(TaskStatus::Processing, 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EligoError::NotFound { ref id, .. } if id == "ghost"));
    }

    #[tokio::test]
    async fn list_active_excludes_terminal_records() {
        let (db, _dir) = setup_db().await;
        let store = SqliteHistoryStore::new(db);
        store.create(new_record("a")).await.unwrap();
        store.create(new_record("b")).await.unwrap();
        store.create(new_record("c")).await.unwrap();
        store
            .update(
                HistoryKey::Task("b"),
                HistoryUpdate::progress(TaskStatus::Processing, 2),
            )
            .await
            .unwrap();
        store
            .update(
                HistoryKey::Task("c"),
                HistoryUpdate {
                    status: Some(TaskStatus::Error),
                    error: Some("provider rejected".to_string()),
                    completed_at: Some(Utc::now()),
                    ..HistoryUpdate::default()
                },
            )
            .await
            .unwrap();

        let mut active: Vec<String> = store
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.task_id)
            .collect();
        active.sort();
        assert_eq!(active, vec!["a", "b"]);

        let recent = store.list_recent("clinic-1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_task_id_is_rejected() {
        let (db, _dir) = setup_db().await;
        let store = SqliteHistoryStore::new(db);
        store.create(new_record("dup")).await.unwrap();
        assert!(store.create(new_record("dup")).await.is_err());
    }

    #[tokio::test]
    async fn tpa_configs_are_scoped_per_clinic() {
        let (db, _dir) = setup_db().await;
        let configs = SqliteTpaConfigs::new(db);
        configs
            .upsert(&TpaConfig {
                clinic_id: "clinic-1".to_string(),
                ins_code: "TPA001".to_string(),
                insurance_name: Some("Neuron".to_string()),
                tpa_name: None,
                ins_payer: None,
            })
            .await
            .unwrap();
        configs
            .upsert(&TpaConfig {
                clinic_id: "clinic-2".to_string(),
                ins_code: "TPA002".to_string(),
                tpa_name: Some("NAS".to_string()),
                ..TpaConfig::default()
            })
            .await
            .unwrap();

        let first = configs.tpa_configs("clinic-1").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].insurance_name.as_deref(), Some("Neuron"));

        assert!(configs.remove("clinic-2", "TPA002").await.unwrap());
        assert!(configs.tpa_configs("clinic-2").await.unwrap().is_empty());
    }
}
