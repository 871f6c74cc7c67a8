// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-poll state machine: turns one poll result into a registry mutation
//! and the history patch that records it.
//!
//! Everything here is synchronous and free of I/O so the scheduler can apply
//! it while holding the registry lock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use eligo_config::model::PollingConfig;
use eligo_core::{EligoError, HistoryUpdate, PollResponse, TaskStatus};

use crate::registry::RegistryEntry;

/// Limits governing how long and how hard a task is polled.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Consecutive HTTP 5xx failures tolerated.
    pub server_failure_limit: u32,
    /// Consecutive failures of any other class tolerated.
    pub failure_limit: u32,
    pub max_in_flight: usize,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

impl PollPolicy {
    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
            server_failure_limit: config.server_failure_limit,
            failure_limit: config.failure_limit,
            max_in_flight: config.max_in_flight.max(1),
        }
    }

    /// Apply one poll result to `entry` and decide what happens next.
    ///
    /// `entry.attempts` is incremented first, so the returned patch always
    /// carries the attempt count including this poll.
    pub fn evaluate(
        &self,
        entry: &mut RegistryEntry,
        result: Result<PollResponse, EligoError>,
        now: DateTime<Utc>,
    ) -> Step {
        entry.attempts = entry.attempts.saturating_add(1);
        let attempts = entry.attempts;
        let previous = entry.last_status;

        match result {
            Ok(response) => {
                entry.consecutive_failures = 0;
                match response.status {
                    TaskStatus::Complete => Step {
                        outcome: Outcome::Completed,
                        update: HistoryUpdate {
                            status: Some(TaskStatus::Complete),
                            polling_attempts: Some(attempts),
                            interim_results: response.interim_results,
                            result: response.result,
                            completed_at: Some(now),
                            ..HistoryUpdate::default()
                        },
                        status_changed: true,
                    },
                    TaskStatus::Error => {
                        let message = response
                            .message
                            .unwrap_or_else(|| "verification failed".to_string());
                        Step::failed(Outcome::Rejected, attempts, message, now)
                    }
                    observed @ (TaskStatus::Pending | TaskStatus::Processing) => {
                        let status = previous.advance(observed);
                        entry.last_status = status;
                        if attempts >= self.max_attempts {
                            return Step::failed(
                                Outcome::TimedOut,
                                attempts,
                                self.timeout_message(),
                                now,
                            );
                        }
                        let mut update = HistoryUpdate::progress(status, attempts);
                        update.interim_results = response.interim_results;
                        Step {
                            outcome: Outcome::InProgress,
                            update,
                            status_changed: status != previous,
                        }
                    }
                }
            }
            Err(err) => {
                entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                let failures = entry.consecutive_failures;
                let limit = if err.is_server_fault() {
                    self.server_failure_limit
                } else {
                    self.failure_limit
                };
                if failures >= limit {
                    let message =
                        format!("polling failed after {failures} consecutive errors: {err}");
                    return Step::failed(Outcome::Unreachable, attempts, message, now);
                }
                if attempts >= self.max_attempts {
                    return Step::failed(Outcome::TimedOut, attempts, self.timeout_message(), now);
                }
                Step {
                    outcome: Outcome::Retrying {
                        failures,
                        limit,
                        error: err.to_string(),
                    },
                    update: HistoryUpdate::progress(previous, attempts),
                    status_changed: false,
                }
            }
        }
    }

    fn timeout_message(&self) -> String {
        format!(
            "verification timed out after {} polling attempts",
            self.max_attempts
        )
    }
}

/// What a single poll did to a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Still pending or processing.
    InProgress,
    /// Transport failure below the tolerated limit.
    Retrying {
        failures: u32,
        limit: u32,
        error: String,
    },
    /// The provider returned a result.
    Completed,
    /// The provider reported the verification as failed.
    Rejected,
    /// Too many consecutive transport failures.
    Unreachable,
    /// The attempt ceiling was reached without a terminal response.
    TimedOut,
}

impl Outcome {
    /// True when the task leaves the registry.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::InProgress | Outcome::Retrying { .. })
    }
}

/// The decision for one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub outcome: Outcome,
    /// Patch for the task's history record.
    pub update: HistoryUpdate,
    /// Whether the task's status differs from before this poll.
    pub status_changed: bool,
}

impl Step {
    fn failed(outcome: Outcome, attempts: u32, message: String, now: DateTime<Utc>) -> Self {
        Self {
            outcome,
            update: HistoryUpdate {
                status: Some(TaskStatus::Error),
                polling_attempts: Some(attempts),
                error: Some(message),
                completed_at: Some(now),
                ..HistoryUpdate::default()
            },
            status_changed: true,
        }
    }

    /// Status the task holds after this poll.
    pub fn status(&self) -> Option<TaskStatus> {
        self.update.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: 4,
            server_failure_limit: 5,
            failure_limit: 3,
            max_in_flight: 2,
        }
    }

    fn entry() -> RegistryEntry {
        RegistryEntry::new("t1", "r1")
    }

    fn server_error() -> EligoError {
        EligoError::provider("HTTP 502", Some(502))
    }

    fn client_error() -> EligoError {
        EligoError::provider("HTTP 404", Some(404))
    }

    #[test]
    fn pending_keeps_task_and_counts_attempt() {
        let mut e = entry();
        let step = policy().evaluate(&mut e, Ok(PollResponse::pending()), Utc::now());
        assert_eq!(step.outcome, Outcome::InProgress);
        assert_eq!(step.update, HistoryUpdate::progress(TaskStatus::Pending, 1));
        assert!(!step.status_changed);
        assert_eq!(e.attempts, 1);
    }

    #[test]
    fn processing_carries_interim_results() {
        let mut e = entry();
        let interim = json!({"screenshot": "s3://shot.png"});
        let step = policy().evaluate(
            &mut e,
            Ok(PollResponse::processing(Some(interim.clone()))),
            Utc::now(),
        );
        assert_eq!(step.status(), Some(TaskStatus::Processing));
        assert_eq!(step.update.interim_results, Some(interim));
        assert!(step.status_changed);
        assert_eq!(e.last_status, TaskStatus::Processing);
    }

    #[test]
    fn complete_is_terminal_with_result() {
        let mut e = entry();
        let now = Utc::now();
        let step = policy().evaluate(&mut e, Ok(PollResponse::complete(json!({"eligible": true}))), now);
        assert!(step.outcome.is_terminal());
        assert_eq!(step.outcome, Outcome::Completed);
        assert_eq!(step.update.result, Some(json!({"eligible": true})));
        assert_eq!(step.update.completed_at, Some(now));
    }

    #[test]
    fn provider_error_is_terminal_with_message() {
        let mut e = entry();
        let step = policy().evaluate(&mut e, Ok(PollResponse::error("member not found")), Utc::now());
        assert_eq!(step.outcome, Outcome::Rejected);
        assert_eq!(step.status(), Some(TaskStatus::Error));
        assert_eq!(step.update.error.as_deref(), Some("member not found"));
    }

    #[test]
    fn non_server_failures_stop_at_three() {
        let p = PollPolicy { max_attempts: 400, ..policy() };
        let mut e = entry();
        for expected in 1..3 {
            let step = p.evaluate(&mut e, Err(client_error()), Utc::now());
            assert_eq!(
                step.outcome,
                Outcome::Retrying {
                    failures: expected,
                    limit: 3,
                    error: client_error().to_string(),
                }
            );
            assert_eq!(step.update, HistoryUpdate::progress(TaskStatus::Pending, expected));
        }
        let step = p.evaluate(&mut e, Err(client_error()), Utc::now());
        assert_eq!(step.outcome, Outcome::Unreachable);
        assert!(step.update.error.unwrap().contains("3 consecutive errors"));
    }

    #[test]
    fn server_failures_stop_at_five() {
        let p = PollPolicy { max_attempts: 400, ..policy() };
        let mut e = entry();
        for _ in 0..4 {
            let step = p.evaluate(&mut e, Err(server_error()), Utc::now());
            assert!(!step.outcome.is_terminal());
        }
        let step = p.evaluate(&mut e, Err(server_error()), Utc::now());
        assert_eq!(step.outcome, Outcome::Unreachable);
        assert_eq!(e.attempts, 5);
    }

    #[test]
    fn success_resets_failure_count() {
        let p = PollPolicy { max_attempts: 400, ..policy() };
        let mut e = entry();
        p.evaluate(&mut e, Err(client_error()), Utc::now());
        p.evaluate(&mut e, Err(client_error()), Utc::now());
        p.evaluate(&mut e, Ok(PollResponse::pending()), Utc::now());
        assert_eq!(e.consecutive_failures, 0);
        let step = p.evaluate(&mut e, Err(client_error()), Utc::now());
        assert!(!step.outcome.is_terminal());
    }

    #[test]
    fn timeout_exactly_at_ceiling() {
        let p = policy();
        let mut e = entry();
        for _ in 0..3 {
            let step = p.evaluate(&mut e, Ok(PollResponse::pending()), Utc::now());
            assert_eq!(step.outcome, Outcome::InProgress);
        }
        let step = p.evaluate(&mut e, Ok(PollResponse::pending()), Utc::now());
        assert_eq!(step.outcome, Outcome::TimedOut);
        assert_eq!(step.update.polling_attempts, Some(4));
        assert!(step.update.error.unwrap().contains("timed out after 4"));
    }

    #[test]
    fn terminal_answer_on_last_attempt_wins() {
        let p = policy();
        let mut e = RegistryEntry { attempts: 3, ..entry() };
        let step = p.evaluate(&mut e, Ok(PollResponse::complete(json!({}))), Utc::now());
        assert_eq!(step.outcome, Outcome::Completed);
    }

    #[test]
    fn provider_error_on_last_attempt_keeps_its_message() {
        let p = policy();
        let mut e = RegistryEntry { attempts: 3, ..entry() };
        let step = p.evaluate(&mut e, Ok(PollResponse::error("policy expired")), Utc::now());
        assert_eq!(step.outcome, Outcome::Rejected);
        assert_eq!(step.update.polling_attempts, Some(4));
        assert_eq!(step.update.error.as_deref(), Some("policy expired"));
    }

    #[test]
    fn failure_limit_on_last_attempt_is_unreachable() {
        let p = policy();
        let mut e = RegistryEntry {
            attempts: 3,
            consecutive_failures: 2,
            ..entry()
        };
        let step = p.evaluate(&mut e, Err(client_error()), Utc::now());
        assert_eq!(step.outcome, Outcome::Unreachable);
        assert!(step.update.error.unwrap().contains("3 consecutive errors"));
    }

    #[test]
    fn restored_entry_at_ceiling_times_out_on_next_poll() {
        let p = policy();
        let mut e = RegistryEntry { attempts: 9, ..entry() };
        let step = p.evaluate(&mut e, Err(client_error()), Utc::now());
        assert_eq!(step.outcome, Outcome::TimedOut);
    }

    fn observed() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![Just(TaskStatus::Pending), Just(TaskStatus::Processing)]
    }

    proptest! {
        #[test]
        fn recorded_status_never_moves_backwards(sequence in proptest::collection::vec(observed(), 1..30)) {
            let p = PollPolicy { max_attempts: 400, ..policy() };
            let mut e = entry();
            let mut highest = TaskStatus::Pending;
            for status in sequence {
                let response = PollResponse { status, ..PollResponse::pending() };
                let step = p.evaluate(&mut e, Ok(response), Utc::now());
                let recorded = step.status().unwrap();
                prop_assert!(recorded.rank() >= highest.rank());
                highest = recorded;
            }
        }
    }
}
