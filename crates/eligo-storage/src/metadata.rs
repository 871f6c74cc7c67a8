// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-index task metadata store with a fixed retention window.
//!
//! One primary record per verification task plus five secondary indices
//! (subject, patient, national ID, member, scheduling). Every write pushes
//! the expiry of the record and of each index set it touches out by the
//! retention window; anything past its expiry reads as absent.

use std::time::Duration;

use chrono::{DateTime, Utc};
use eligo_core::{EligoError, IndexKind, TaskMetadata, TaskStatus};
use tracing::{debug, warn};

use crate::database::{Database, now_millis};
use crate::queries::metadata::{self as q, StatusWrite};

/// Default retention: 90 days after the last write.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// SQLite-backed metadata store.
#[derive(Clone)]
pub struct MetadataStore {
    db: Database,
    retention: Duration,
}

impl MetadataStore {
    pub fn new(db: Database) -> Self {
        Self::with_retention(db, DEFAULT_RETENTION)
    }

    pub fn with_retention(db: Database, retention: Duration) -> Self {
        Self { db, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn expiry_from(&self, now: i64) -> i64 {
        let window = i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX);
        now.saturating_add(window)
    }

    /// Store a task's metadata and index it under every non-empty
    /// identifying field. All-or-nothing.
    pub async fn record(&self, metadata: &TaskMetadata) -> Result<(), EligoError> {
        let expires_at = self.expiry_from(now_millis());
        q::put(&self.db, metadata, expires_at).await?;
        debug!(task_id = %metadata.task_id, status = %metadata.status, "metadata recorded");
        Ok(())
    }

    /// Move a task to `status`.
    ///
    /// Missing or expired tasks are a silent no-op, as is any transition that
    /// would move backwards or out of a terminal status. A stored payload
    /// that fails to decode is logged and left in place.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), EligoError> {
        let now = now_millis();
        match q::update_status(
            &self.db,
            task_id,
            status,
            completed_at,
            now,
            self.expiry_from(now),
        )
        .await?
        {
            StatusWrite::Updated => {
                debug!(task_id, status = %status, "metadata status updated");
                Ok(())
            }
            StatusWrite::Missing => {
                debug!(task_id, "status update for unknown task ignored");
                Ok(())
            }
            StatusWrite::Rejected { current } => {
                debug!(task_id, current = %current, requested = %status, "status regression ignored");
                Ok(())
            }
            StatusWrite::Undecodable(e) => {
                warn!(task_id, error = %e, "skipping status update on undecodable metadata");
                Ok(())
            }
        }
    }

    /// All live records referenced by `(kind, value)`, newest first.
    ///
    /// `value` is trimmed the same way index entries are; a blank value
    /// matches nothing. Records that fail to decode are logged and skipped.
    pub async fn find_by(
        &self,
        kind: IndexKind,
        value: &str,
    ) -> Result<Vec<TaskMetadata>, EligoError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Vec::new());
        }
        let rows = q::find_payloads(&self.db, kind, value, now_millis()).await?;
        let mut records: Vec<TaskMetadata> = rows
            .into_iter()
            .filter_map(|(task_id, payload)| {
                match serde_json::from_str::<TaskMetadata>(&payload) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(task_id, kind = %kind, error = %e, "skipping undecodable metadata");
                        None
                    }
                }
            })
            .collect();
        // The SQL ordering uses the stored column; sort again on the decoded
        // value so the result never depends on it.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Most recent completed task for a subject.
    pub async fn latest_completed_by(
        &self,
        subject_id: &str,
    ) -> Result<Option<TaskMetadata>, EligoError> {
        Ok(self
            .find_by(IndexKind::Subject, subject_id)
            .await?
            .into_iter()
            .find(|record| record.status == TaskStatus::Complete))
    }

    /// Delete a task and all of its index memberships. No-op when absent.
    pub async fn remove(&self, task_id: &str) -> Result<(), EligoError> {
        if q::delete(&self.db, task_id).await? {
            debug!(task_id, "metadata removed");
        }
        Ok(())
    }

    /// Fetch one task. A stored payload that fails to decode is an error.
    pub async fn get(&self, task_id: &str) -> Result<Option<TaskMetadata>, EligoError> {
        let Some(payload) = q::get_payload(&self.db, task_id, now_millis()).await? else {
            return Ok(None);
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|source| EligoError::Decode {
                key: task_id.to_string(),
                source,
            })
    }

    /// Delete expired rows. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<usize, EligoError> {
        let removed = q::purge_expired(&self.db, now_millis()).await?;
        if removed > 0 {
            debug!(removed, "purged expired metadata rows");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use eligo_core::{IdType, VisitType};
    use rusqlite::params;
    use tempfile::tempdir;

    async fn setup_store() -> (MetadataStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (MetadataStore::new(db), dir)
    }

    fn metadata(task_id: &str, subject: &str, created_at: DateTime<Utc>) -> TaskMetadata {
        TaskMetadata {
            task_id: task_id.to_string(),
            subject_id: subject.to_string(),
            patient_id: format!("P-{subject}"),
            patient_name: Some("Test Patient".to_string()),
            national_id: Some("784-1985-7654321-2".to_string()),
            member_id: Some("MEM-77".to_string()),
            provider_code: "TPA002".to_string(),
            id_type: IdType::CardNumber,
            visit_type: VisitType::Outpatient,
            scheduling_id: Some("APT-5".to_string()),
            status: TaskStatus::Pending,
            created_at,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn record_is_findable_under_every_index() {
        let (store, _dir) = setup_store().await;
        let record = metadata("task-1", "MPI-9", Utc::now());
        store.record(&record).await.unwrap();

        for (kind, value) in [
            (IndexKind::Subject, "MPI-9"),
            (IndexKind::Patient, "P-MPI-9"),
            (IndexKind::NationalId, "784-1985-7654321-2"),
            (IndexKind::Member, "MEM-77"),
            (IndexKind::Scheduling, "APT-5"),
        ] {
            let found = store.find_by(kind, value).await.unwrap();
            assert_eq!(found, vec![record.clone()], "lookup by {kind}");
        }
    }

    #[tokio::test]
    async fn padded_field_is_findable_by_its_own_value() {
        let (store, _dir) = setup_store().await;
        let mut record = metadata("task-1", "MPI-1 ", Utc::now());
        record.member_id = Some("  MEM-77".to_string());
        store.record(&record).await.unwrap();

        let found = store
            .find_by(IndexKind::Subject, &record.subject_id)
            .await
            .unwrap();
        assert_eq!(found, vec![record.clone()]);
        assert_eq!(
            store.find_by(IndexKind::Subject, "MPI-1").await.unwrap().len(),
            1
        );
        assert_eq!(
            store.find_by(IndexKind::Member, "  MEM-77").await.unwrap().len(),
            1
        );
        assert!(store.find_by(IndexKind::Subject, "   ").await.unwrap().is_empty());

        store
            .update_status("task-1", TaskStatus::Complete, Some(Utc::now()))
            .await
            .unwrap();
        let latest = store.latest_completed_by(" MPI-1").await.unwrap().unwrap();
        assert_eq!(latest.task_id, "task-1");
    }

    #[tokio::test]
    async fn removed_task_is_never_found() {
        let (store, _dir) = setup_store().await;
        let record = metadata("task-1", "MPI-9", Utc::now());
        store.record(&record).await.unwrap();
        store.remove("task-1").await.unwrap();

        assert!(store.get("task-1").await.unwrap().is_none());
        for (kind, value) in record.index_entries() {
            assert!(store.find_by(kind, &value).await.unwrap().is_empty());
        }
        // Second removal is a no-op.
        store.remove("task-1").await.unwrap();
    }

    #[tokio::test]
    async fn find_by_orders_newest_first() {
        let (store, _dir) = setup_store().await;
        let now = Utc::now();
        let t1 = metadata("t1", "MPI-1", now - ChronoDuration::seconds(10));
        let t2 = metadata("t2", "MPI-1", now);
        store.record(&t1).await.unwrap();
        store.record(&t2).await.unwrap();

        let ids: Vec<String> = store
            .find_by(IndexKind::Subject, "MPI-1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.task_id)
            .collect();
        assert_eq!(ids, vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn status_updates_are_monotonic() {
        let (store, _dir) = setup_store().await;
        store
            .record(&metadata("task-1", "MPI-1", Utc::now()))
            .await
            .unwrap();

        store
            .update_status("task-1", TaskStatus::Processing, None)
            .await
            .unwrap();
        store
            .update_status("task-1", TaskStatus::Pending, None)
            .await
            .unwrap();
        assert_eq!(
            store.get("task-1").await.unwrap().unwrap().status,
            TaskStatus::Processing
        );

        let done = Utc::now();
        store
            .update_status("task-1", TaskStatus::Complete, Some(done))
            .await
            .unwrap();
        store
            .update_status("task-1", TaskStatus::Error, Some(Utc::now()))
            .await
            .unwrap();
        let stored = store.get("task-1").await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Complete);
        assert_eq!(stored.completed_at, Some(done));
    }

    #[tokio::test]
    async fn update_status_on_unknown_task_is_noop() {
        let (store, _dir) = setup_store().await;
        store
            .update_status("ghost", TaskStatus::Complete, Some(Utc::now()))
            .await
            .unwrap();
        assert!(store.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_completed_skips_unfinished_tasks() {
        let (store, _dir) = setup_store().await;
        let now = Utc::now();
        let older = metadata("older", "MPI-3", now - ChronoDuration::minutes(5));
        let newer = metadata("newer", "MPI-3", now);
        store.record(&older).await.unwrap();
        store.record(&newer).await.unwrap();
        assert!(store.latest_completed_by("MPI-3").await.unwrap().is_none());

        store
            .update_status("older", TaskStatus::Complete, Some(now))
            .await
            .unwrap();
        let latest = store.latest_completed_by("MPI-3").await.unwrap().unwrap();
        assert_eq!(latest.task_id, "older");
    }

    #[tokio::test]
    async fn zero_retention_expires_immediately() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let store = MetadataStore::with_retention(db, Duration::ZERO);
        store
            .record(&metadata("task-1", "MPI-1", Utc::now()))
            .await
            .unwrap();

        assert!(store.get("task-1").await.unwrap().is_none());
        assert!(
            store
                .find_by(IndexKind::Subject, "MPI-1")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.purge_expired().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn corrupt_payload_is_an_error_for_get_but_skipped_by_find() {
        let (store, _dir) = setup_store().await;
        store
            .record(&metadata("good", "MPI-4", Utc::now()))
            .await
            .unwrap();
        store
            .record(&metadata("bad", "MPI-4", Utc::now()))
            .await
            .unwrap();
        store
            .db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE task_metadata SET payload = ?1 WHERE task_id = 'bad'",
                    params!["{not json"],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, EligoError::Decode { ref key, .. } if key == "bad"));

        // A status update on the corrupt record is skipped, not an error.
        store
            .update_status("bad", TaskStatus::Complete, Some(Utc::now()))
            .await
            .unwrap();
        assert!(store.get("bad").await.is_err());

        let found = store.find_by(IndexKind::Subject, "MPI-4").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].task_id, "good");
    }
}
