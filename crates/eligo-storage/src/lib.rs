// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Eligo verification tracker.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. On top of that sit
//! the task metadata store, the history record store, appointment intake
//! marks, and clinic TPA configurations.

pub mod adapter;
pub mod appointments;
pub mod database;
pub mod metadata;
pub mod migrations;
pub mod queries;

pub use adapter::{SqliteHistoryStore, SqliteTpaConfigs};
pub use appointments::{AppointmentMark, AppointmentTracker, MarkState};
pub use database::Database;
pub use metadata::MetadataStore;
