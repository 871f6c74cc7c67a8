// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness backed by a temporary SQLite database.
//!
//! `TestHarness` opens a fresh database in a temp directory, runs the
//! migrations, and exposes every store built on it. The directory is removed
//! when the harness is dropped.

use std::path::PathBuf;
use std::sync::Arc;

use eligo_core::EligoError;
use eligo_storage::{
    AppointmentTracker, Database, MetadataStore, SqliteHistoryStore, SqliteTpaConfigs,
};

/// Every SQLite-backed store, opened on one temporary database.
pub struct TestHarness {
    pub db: Database,
    pub metadata: MetadataStore,
    pub history: Arc<SqliteHistoryStore>,
    pub appointments: AppointmentTracker,
    pub tpa_configs: Arc<SqliteTpaConfigs>,
    db_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Result<Self, EligoError> {
        let dir = tempfile::TempDir::new().map_err(|e| EligoError::Storage { source: e.into() })?;
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        Ok(Self {
            metadata: MetadataStore::new(db.clone()),
            history: Arc::new(SqliteHistoryStore::new(db.clone())),
            appointments: AppointmentTracker::new(db.clone()),
            tpa_configs: Arc::new(SqliteTpaConfigs::new(db.clone())),
            db,
            db_path,
            _dir: dir,
        })
    }

    /// Path of the database file, for reopening it as a restarted process.
    pub fn db_path(&self) -> String {
        self.db_path.to_string_lossy().into_owned()
    }
}
