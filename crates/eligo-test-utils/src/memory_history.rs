// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory history store with failure injection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use eligo_core::{
    EligoError, HistoryKey, HistoryRecord, HistoryStore, HistoryUpdate, NewHistoryRecord,
    TaskStatus,
};

/// A `HistoryStore` kept in a `Vec`, in creation order.
///
/// Every applied update is also appended to a log so tests can assert on
/// the exact sequence of patches the scheduler issued.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
    updates: Mutex<Vec<(String, HistoryUpdate)>>,
    fail_updates: AtomicBool,
    fail_list: AtomicBool,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<HistoryRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `update` fail with a storage error until switched back.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make `list_active` fail with a storage error until switched back.
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Insert a record directly, bypassing `create`. Used to simulate state
    /// left behind by a previous process.
    pub fn seed(&self, record: HistoryRecord) {
        self.records().push(record);
    }

    /// Current copy of the record for `task_id`.
    pub fn record(&self, task_id: &str) -> Option<HistoryRecord> {
        self.records().iter().find(|r| r.task_id == task_id).cloned()
    }

    /// Updates applied to `task_id`'s record, oldest first.
    pub fn updates_for(&self, task_id: &str) -> Vec<HistoryUpdate> {
        let Some(id) = self.record(task_id).map(|r| r.id) else {
            return Vec::new();
        };
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(record_id, _)| *record_id == id)
            .map(|(_, update)| update.clone())
            .collect()
    }

    /// Build a record the way `create` would, with the given status and
    /// attempt count.
    pub fn active_record(task_id: &str, status: TaskStatus, attempts: u32) -> HistoryRecord {
        let now = Utc::now();
        HistoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            clinic_id: "test-clinic".to_string(),
            task_id: task_id.to_string(),
            patient_id: format!("patient-{task_id}"),
            patient_name: None,
            patient_mpi: None,
            date_of_birth: None,
            insurance_payer: None,
            appointment_id: None,
            encounter_id: None,
            status,
            polling_attempts: attempts,
            interim_results: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

fn storage_failure(what: &str) -> EligoError {
    EligoError::Storage {
        source: format!("injected {what} failure").into(),
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn create(&self, record: NewHistoryRecord) -> Result<String, EligoError> {
        let mut created = Self::active_record(&record.task_id, TaskStatus::Pending, 0);
        created.clinic_id = record.clinic_id;
        created.patient_id = record.patient_id;
        created.patient_name = record.patient_name;
        created.patient_mpi = record.patient_mpi;
        created.date_of_birth = record.date_of_birth;
        created.insurance_payer = record.insurance_payer;
        created.appointment_id = record.appointment_id;
        created.encounter_id = record.encounter_id;
        let id = created.id.clone();
        self.records().push(created);
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<HistoryRecord>, EligoError> {
        Ok(self.records().iter().find(|r| r.id == id).cloned())
    }

    async fn get_by_task_id(&self, task_id: &str) -> Result<Option<HistoryRecord>, EligoError> {
        Ok(self.record(task_id))
    }

    async fn update(&self, key: HistoryKey<'_>, update: HistoryUpdate) -> Result<(), EligoError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(storage_failure("update"));
        }
        let mut records = self.records();
        let record = records
            .iter_mut()
            .find(|r| match key {
                HistoryKey::Record(id) => r.id == id,
                HistoryKey::Task(task_id) => r.task_id == task_id,
            })
            .ok_or_else(|| EligoError::NotFound {
                kind: "history record".to_string(),
                id: match key {
                    HistoryKey::Record(id) | HistoryKey::Task(id) => id.to_string(),
                },
            })?;

        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(attempts) = update.polling_attempts {
            record.polling_attempts = attempts;
        }
        if let Some(interim) = &update.interim_results {
            record.interim_results = Some(interim.clone());
        }
        if let Some(result) = &update.result {
            record.result = Some(result.clone());
        }
        if let Some(error) = &update.error {
            record.error = Some(error.clone());
        }
        if update.completed_at.is_some() {
            record.completed_at = update.completed_at;
        }
        record.updated_at = Utc::now();
        let id = record.id.clone();
        drop(records);

        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, update));
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<HistoryRecord>, EligoError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(storage_failure("list"));
        }
        Ok(self
            .records()
            .iter()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect())
    }
}
