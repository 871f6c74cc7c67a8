// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide wiring shared by the `serve` and `check` commands.

use std::sync::Arc;

use eligo_config::EligoConfig;
use eligo_core::EligoError;
use eligo_intake::AutoChecker;
use eligo_mantys::MantysProvider;
use eligo_storage::{Database, MetadataStore, SqliteHistoryStore, SqliteTpaConfigs};
use eligo_tracker::{PollPolicy, Tracker};
use tracing::info;

/// Database, provider, and tracker, built once per process.
pub struct AppContext {
    pub db: Database,
    pub provider: Arc<MantysProvider>,
    pub tracker: Arc<Tracker>,
    pub tpa_configs: Arc<SqliteTpaConfigs>,
}

impl AppContext {
    pub async fn open(config: &EligoConfig) -> Result<Self, EligoError> {
        let db = open_database(config).await?;
        let provider = Arc::new(MantysProvider::new(&config.mantys)?);
        let tracker = Arc::new(Tracker::new(
            provider.clone(),
            Arc::new(SqliteHistoryStore::new(db.clone())),
            metadata_store(config, db.clone()),
            PollPolicy::from_config(&config.polling),
        ));
        Ok(Self {
            tpa_configs: Arc::new(SqliteTpaConfigs::new(db.clone())),
            db,
            provider,
            tracker,
        })
    }

    /// An intake checker wired to this context.
    pub fn checker(&self, config: &EligoConfig) -> AutoChecker {
        AutoChecker::from_config(
            self.tracker.clone(),
            self.provider.clone(),
            self.tpa_configs.clone(),
            self.db.clone(),
            &config.intake,
        )
    }
}

pub async fn open_database(config: &EligoConfig) -> Result<Database, EligoError> {
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(path = %config.storage.database_path, "database opened");
    Ok(db)
}

pub fn metadata_store(config: &EligoConfig, db: Database) -> MetadataStore {
    MetadataStore::with_retention(db, config.metadata.retention())
}
