// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-appointment intake marks.
//!
//! An appointment is claimed before a verification is submitted for it, then
//! marked completed (long TTL) or errored (short TTL, eligible for retry).

use std::time::Duration;

use chrono::{DateTime, Utc};
use eligo_core::EligoError;
use tracing::{debug, info, warn};

use crate::database::{Database, now_millis, parse_ts};
use crate::queries::appointments as q;

const STATE_PROCESSING: &str = "processing";
const STATE_COMPLETED: &str = "completed";
const STATE_ERROR: &str = "error";

/// Where an appointment stands in intake.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkState {
    Processing,
    Completed { task_id: String },
    Error { message: String, task_id: Option<String> },
}

/// A live appointment mark.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentMark {
    pub appointment_id: i64,
    pub state: MarkState,
    pub updated_at: DateTime<Utc>,
}

/// Tracks which appointments intake has already handled.
#[derive(Clone)]
pub struct AppointmentTracker {
    db: Database,
    processed_ttl: Duration,
    error_ttl: Duration,
}

impl AppointmentTracker {
    /// Default TTLs: seven days after completion, one day after an error.
    pub fn new(db: Database) -> Self {
        Self::with_ttls(
            db,
            Duration::from_secs(7 * 24 * 60 * 60),
            Duration::from_secs(24 * 60 * 60),
        )
    }

    pub fn with_ttls(db: Database, processed_ttl: Duration, error_ttl: Duration) -> Self {
        Self {
            db,
            processed_ttl,
            error_ttl,
        }
    }

    fn expiry(now: i64, ttl: Duration) -> i64 {
        now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }

    /// Current live mark, if any.
    pub async fn status(&self, appointment_id: i64) -> Result<Option<AppointmentMark>, EligoError> {
        let Some(row) = q::get(&self.db, appointment_id, now_millis()).await? else {
            return Ok(None);
        };
        let state = match row.state.as_str() {
            STATE_PROCESSING => MarkState::Processing,
            STATE_COMPLETED => MarkState::Completed {
                task_id: row.task_id.unwrap_or_default(),
            },
            STATE_ERROR => MarkState::Error {
                message: row.message.unwrap_or_default(),
                task_id: row.task_id,
            },
            other => {
                return Err(EligoError::Storage {
                    source: format!("unknown appointment mark state `{other}`").into(),
                });
            }
        };
        Ok(Some(AppointmentMark {
            appointment_id,
            state,
            updated_at: parse_ts("updated_at", &row.updated_at)?,
        }))
    }

    /// Whether intake should (re)try this appointment: never seen, expired,
    /// or the last attempt errored.
    pub async fn should_process(&self, appointment_id: i64) -> Result<bool, EligoError> {
        Ok(match self.status(appointment_id).await? {
            None => true,
            Some(AppointmentMark {
                state: MarkState::Error { .. },
                ..
            }) => {
                info!(appointment_id, "previous attempt errored, allowing retry");
                true
            }
            Some(_) => false,
        })
    }

    /// Atomically claim an appointment. Returns false if another pass holds
    /// a live processing or completed mark.
    pub async fn mark_processing(&self, appointment_id: i64) -> Result<bool, EligoError> {
        let now = now_millis();
        let claimed = q::claim(
            &self.db,
            appointment_id,
            STATE_PROCESSING,
            STATE_ERROR,
            now,
            Self::expiry(now, self.processed_ttl),
        )
        .await?;
        if claimed {
            debug!(appointment_id, "appointment claimed");
        } else {
            debug!(appointment_id, "appointment already claimed");
        }
        Ok(claimed)
    }

    pub async fn mark_completed(&self, appointment_id: i64, task_id: &str) -> Result<(), EligoError> {
        let expires_at = Self::expiry(now_millis(), self.processed_ttl);
        q::set(
            &self.db,
            appointment_id,
            STATE_COMPLETED,
            Some(task_id),
            None,
            expires_at,
        )
        .await?;
        info!(appointment_id, task_id, "appointment marked completed");
        Ok(())
    }

    /// Record a failure. The short TTL lets a later pass retry.
    pub async fn mark_error(
        &self,
        appointment_id: i64,
        message: &str,
        task_id: Option<&str>,
    ) -> Result<(), EligoError> {
        let expires_at = Self::expiry(now_millis(), self.error_ttl);
        q::set(
            &self.db,
            appointment_id,
            STATE_ERROR,
            task_id,
            Some(message),
            expires_at,
        )
        .await?;
        warn!(appointment_id, reason = message, "appointment marked as error");
        Ok(())
    }

    /// Delete expired marks. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<usize, EligoError> {
        q::purge_expired(&self.db, now_millis()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_tracker() -> (AppointmentTracker, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (AppointmentTracker::new(db), dir)
    }

    #[tokio::test]
    async fn unseen_appointment_should_process() {
        let (tracker, _dir) = setup_tracker().await;
        assert!(tracker.should_process(101).await.unwrap());
        assert!(tracker.status(101).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let (tracker, _dir) = setup_tracker().await;
        assert!(tracker.mark_processing(101).await.unwrap());
        assert!(!tracker.mark_processing(101).await.unwrap());
        assert!(!tracker.should_process(101).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let (tracker, _dir) = setup_tracker().await;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.mark_processing(7).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn completed_appointment_is_skipped() {
        let (tracker, _dir) = setup_tracker().await;
        tracker.mark_processing(5).await.unwrap();
        tracker.mark_completed(5, "task-5").await.unwrap();

        assert!(!tracker.should_process(5).await.unwrap());
        assert!(!tracker.mark_processing(5).await.unwrap());
        let mark = tracker.status(5).await.unwrap().unwrap();
        assert_eq!(
            mark.state,
            MarkState::Completed {
                task_id: "task-5".to_string()
            }
        );
    }

    #[tokio::test]
    async fn errored_appointment_can_be_reclaimed() {
        let (tracker, _dir) = setup_tracker().await;
        tracker.mark_processing(9).await.unwrap();
        tracker
            .mark_error(9, "Failed to create verification task", None)
            .await
            .unwrap();

        assert!(tracker.should_process(9).await.unwrap());
        assert!(tracker.mark_processing(9).await.unwrap());
        assert_eq!(
            tracker.status(9).await.unwrap().unwrap().state,
            MarkState::Processing
        );
    }

    #[tokio::test]
    async fn expired_marks_are_forgotten() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let tracker = AppointmentTracker::with_ttls(db, Duration::ZERO, Duration::ZERO);
        tracker.mark_completed(11, "task-11").await.unwrap();

        assert!(tracker.should_process(11).await.unwrap());
        assert_eq!(tracker.purge_expired().await.unwrap(), 1);
    }
}
