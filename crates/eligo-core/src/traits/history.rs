// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History record store trait.

use async_trait::async_trait;

use crate::error::EligoError;
use crate::types::{HistoryKey, HistoryRecord, HistoryUpdate, NewHistoryRecord};

/// Persistence for the per-task history records the portal UI reads.
///
/// The polling scheduler only issues partial updates through
/// [`HistoryStore::update`]; it never deletes or recreates records.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Creates a record with status `pending` and zero polling attempts.
    /// Returns the new record id.
    async fn create(&self, record: NewHistoryRecord) -> Result<String, EligoError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<HistoryRecord>, EligoError>;

    async fn get_by_task_id(&self, task_id: &str) -> Result<Option<HistoryRecord>, EligoError>;

    /// Applies a partial update. Returns [`EligoError::NotFound`] when no
    /// record matches the key.
    async fn update(&self, key: HistoryKey<'_>, update: HistoryUpdate) -> Result<(), EligoError>;

    /// Records whose status is `pending` or `processing`.
    async fn list_active(&self) -> Result<Vec<HistoryRecord>, EligoError>;
}
