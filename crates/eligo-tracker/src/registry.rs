// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory registry of tasks the scheduler is actively polling.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use eligo_core::{HistoryRecord, TaskStatus};

/// Live polling state for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub task_id: String,
    /// Id of the history record that receives this task's updates.
    pub record_id: String,
    /// Polls issued so far, including any from before a restart.
    pub attempts: u32,
    /// Transport failures since the last successful poll.
    pub consecutive_failures: u32,
    /// Highest status observed so far.
    pub last_status: TaskStatus,
    pub started_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn new(task_id: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            record_id: record_id.into(),
            attempts: 0,
            consecutive_failures: 0,
            last_status: TaskStatus::Pending,
            started_at: Utc::now(),
        }
    }

    /// Rebuild an entry from a persisted history record, keeping its
    /// attempt count and status.
    pub fn from_record(record: &HistoryRecord) -> Self {
        Self {
            task_id: record.task_id.clone(),
            record_id: record.id.clone(),
            attempts: record.polling_attempts,
            consecutive_failures: 0,
            last_status: record.status,
            started_at: record.created_at,
        }
    }
}

/// Entries keyed by task id.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` unless its task is already registered. Returns true
    /// when inserted.
    pub fn insert(&mut self, entry: RegistryEntry) -> bool {
        if self.entries.contains_key(&entry.task_id) {
            return false;
        }
        self.entries.insert(entry.task_id.clone(), entry);
        true
    }

    pub fn get_mut(&mut self, task_id: &str) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(task_id)
    }

    pub fn remove(&mut self, task_id: &str) -> Option<RegistryEntry> {
        self.entries.remove(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of every entry, oldest first.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        entries
    }
}
