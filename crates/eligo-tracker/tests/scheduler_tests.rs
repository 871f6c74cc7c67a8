// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polling scheduler behavior against a scripted provider and in-memory
//! history.

use std::sync::Arc;
use std::time::Duration;

use eligo_core::{HistoryStore, NewHistoryRecord, TaskStatus};
use eligo_test_utils::{MemoryHistory, MockPoll, MockProvider};
use eligo_tracker::{PollPolicy, PollingScheduler};
use serde_json::json;
use tokio::time::{Instant, sleep};

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 400,
        server_failure_limit: 5,
        failure_limit: 3,
        max_in_flight: 8,
    }
}

struct Fixture {
    provider: Arc<MockProvider>,
    history: Arc<MemoryHistory>,
    scheduler: PollingScheduler,
}

impl Fixture {
    fn new(policy: PollPolicy) -> Self {
        Self::with_provider(MockProvider::new(), policy)
    }

    fn with_provider(provider: MockProvider, policy: PollPolicy) -> Self {
        let provider = Arc::new(provider);
        let history = Arc::new(MemoryHistory::new());
        let scheduler = PollingScheduler::new(provider.clone(), history.clone(), None, policy);
        Self {
            provider,
            history,
            scheduler,
        }
    }

    async fn track(&self, task_id: &str) -> String {
        let record_id = self
            .history
            .create(NewHistoryRecord {
                clinic_id: "clinic-1".into(),
                task_id: task_id.into(),
                patient_id: format!("patient-{task_id}"),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(self.scheduler.add_task(task_id, &record_id));
        record_id
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn complete_response_finishes_task_in_one_tick() {
    let fx = Fixture::new(PollPolicy {
        interval: Duration::from_millis(50),
        ..fast_policy()
    });
    fx.provider
        .script("t1", vec![MockPoll::complete(json!({"eligible": true}))]);
    fx.track("t1").await;
    assert!(fx.scheduler.is_task_active("t1"));

    wait_until(|| !fx.scheduler.is_task_active("t1")).await;
    assert_eq!(fx.provider.poll_count("t1"), 1);

    let record = fx.history.record("t1").unwrap();
    assert_eq!(record.status, TaskStatus::Complete);
    assert_eq!(record.result, Some(json!({"eligible": true})));
    assert_eq!(record.polling_attempts, 1);
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn provider_error_is_recorded_and_removed() {
    let fx = Fixture::new(fast_policy());
    fx.provider.script(
        "t1",
        vec![MockPoll::processing(json!({"step": "login"})), MockPoll::error("card expired")],
    );
    fx.track("t1").await;

    wait_until(|| !fx.scheduler.is_task_active("t1")).await;
    let record = fx.history.record("t1").unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert_eq!(record.error.as_deref(), Some("card expired"));
    assert_eq!(record.interim_results, Some(json!({"step": "login"})));
    assert_eq!(record.polling_attempts, 2);
}

#[tokio::test]
async fn times_out_exactly_at_attempt_ceiling() {
    let fx = Fixture::new(PollPolicy {
        interval: Duration::from_millis(5),
        max_attempts: 6,
        ..fast_policy()
    });
    fx.track("slow").await;

    wait_until(|| !fx.scheduler.is_task_active("slow")).await;
    assert_eq!(fx.provider.poll_count("slow"), 6);

    let record = fx.history.record("slow").unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert_eq!(record.polling_attempts, 6);
    assert!(record.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn three_network_failures_fail_the_task() {
    let fx = Fixture::new(fast_policy());
    fx.provider.script("t1", vec![MockPoll::network_failure()]);
    fx.track("t1").await;

    wait_until(|| !fx.scheduler.is_task_active("t1")).await;
    assert_eq!(fx.provider.poll_count("t1"), 3);
    let record = fx.history.record("t1").unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert!(record.error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn five_server_failures_fail_the_task() {
    let fx = Fixture::new(fast_policy());
    fx.provider.script("t1", vec![MockPoll::server_failure()]);
    fx.track("t1").await;

    wait_until(|| !fx.scheduler.is_task_active("t1")).await;
    assert_eq!(fx.provider.poll_count("t1"), 5);
    assert_eq!(fx.history.record("t1").unwrap().status, TaskStatus::Error);
}

#[tokio::test]
async fn recovered_failures_do_not_accumulate() {
    let fx = Fixture::new(fast_policy());
    fx.provider.script(
        "t1",
        vec![
            MockPoll::network_failure(),
            MockPoll::network_failure(),
            MockPoll::pending(),
            MockPoll::network_failure(),
            MockPoll::network_failure(),
            MockPoll::complete(json!({})),
        ],
    );
    fx.track("t1").await;

    wait_until(|| !fx.scheduler.is_task_active("t1")).await;
    let record = fx.history.record("t1").unwrap();
    assert_eq!(record.status, TaskStatus::Complete);
    assert_eq!(record.polling_attempts, 6);
}

#[tokio::test]
async fn recorded_status_never_regresses() {
    let fx = Fixture::new(fast_policy());
    fx.provider.script(
        "t1",
        vec![
            MockPoll::processing(json!({"step": 1})),
            MockPoll::pending(),
            MockPoll::pending(),
            MockPoll::complete(json!({"ok": true})),
        ],
    );
    fx.track("t1").await;

    wait_until(|| !fx.scheduler.is_task_active("t1")).await;
    let statuses: Vec<_> = fx
        .history
        .updates_for("t1")
        .into_iter()
        .map(|u| u.status.unwrap())
        .collect();
    assert_eq!(
        statuses,
        vec![
            TaskStatus::Processing,
            TaskStatus::Processing,
            TaskStatus::Processing,
            TaskStatus::Complete,
        ]
    );
}

#[tokio::test]
async fn initialize_restores_active_tasks_with_attempts() {
    let fx = Fixture::new(PollPolicy {
        interval: Duration::from_millis(50),
        ..fast_policy()
    });
    fx.history
        .seed(MemoryHistory::active_record("a", TaskStatus::Processing, 7));
    fx.history
        .seed(MemoryHistory::active_record("b", TaskStatus::Pending, 3));
    fx.history
        .seed(MemoryHistory::active_record("done", TaskStatus::Complete, 12));
    fx.provider.script("a", vec![MockPoll::complete(json!({}))]);
    fx.provider.script("b", vec![MockPoll::complete(json!({}))]);

    assert_eq!(fx.scheduler.initialize().await.unwrap(), 2);
    assert_eq!(fx.scheduler.active_count(), 2);
    assert!(!fx.scheduler.is_task_active("done"));

    // A second call does not reload.
    assert_eq!(fx.scheduler.initialize().await.unwrap(), 0);

    wait_until(|| fx.scheduler.active_count() == 0).await;
    assert_eq!(fx.history.record("a").unwrap().polling_attempts, 8);
    assert_eq!(fx.history.record("b").unwrap().polling_attempts, 4);
    assert_eq!(fx.provider.poll_count("done"), 0);
}

#[tokio::test]
async fn initialize_failure_leaves_registry_empty() {
    let fx = Fixture::new(fast_policy());
    fx.history
        .seed(MemoryHistory::active_record("a", TaskStatus::Pending, 0));
    fx.history.set_fail_list(true);

    assert!(fx.scheduler.initialize().await.is_err());
    assert_eq!(fx.scheduler.active_count(), 0);

    fx.history.set_fail_list(false);
    assert_eq!(fx.scheduler.initialize().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_add_task_registers_once() {
    let fx = Fixture::new(PollPolicy {
        interval: Duration::from_secs(60),
        ..fast_policy()
    });
    let mut handles = Vec::new();
    for _ in 0..16 {
        let scheduler = fx.scheduler.clone();
        handles.push(tokio::spawn(async move {
            scheduler.add_task("shared", "record-1")
        }));
    }
    let mut added = 0;
    for handle in handles {
        if handle.await.unwrap() {
            added += 1;
        }
    }
    assert_eq!(added, 1);
    assert_eq!(fx.scheduler.active_count(), 1);
    fx.scheduler.shutdown().await;
}

#[tokio::test]
async fn loop_exits_when_empty_and_restarts_on_add() {
    let fx = Fixture::new(fast_policy());
    fx.provider.script("t1", vec![MockPoll::complete(json!({}))]);
    fx.provider.script("t2", vec![MockPoll::complete(json!({}))]);

    fx.track("t1").await;
    assert!(fx.scheduler.is_running());
    wait_until(|| !fx.scheduler.is_running()).await;
    assert_eq!(fx.scheduler.active_count(), 0);

    fx.track("t2").await;
    assert!(fx.scheduler.is_running());
    wait_until(|| !fx.scheduler.is_task_active("t2")).await;
    assert_eq!(fx.history.record("t2").unwrap().status, TaskStatus::Complete);
}

#[tokio::test]
async fn shutdown_halts_polling_and_keeps_state() {
    let fx = Fixture::new(fast_policy());
    fx.track("t1").await;
    wait_until(|| fx.provider.poll_count("t1") >= 2).await;

    fx.scheduler.shutdown().await;
    assert!(!fx.scheduler.is_running());
    let polls = fx.provider.poll_count("t1");
    sleep(Duration::from_millis(60)).await;
    assert_eq!(fx.provider.poll_count("t1"), polls);
    assert!(fx.scheduler.is_task_active("t1"));
    assert!(!fx.history.record("t1").unwrap().status.is_terminal());

    // Tasks added while halted wait for the scheduler to resume.
    fx.track("t2").await;
    assert!(!fx.scheduler.is_running());

    fx.scheduler.initialize().await.unwrap();
    wait_until(|| fx.provider.poll_count("t2") >= 1).await;
    fx.scheduler.shutdown().await;
}

#[tokio::test]
async fn removed_task_is_no_longer_polled() {
    let fx = Fixture::new(fast_policy());
    fx.track("t1").await;
    fx.track("t2").await;
    wait_until(|| fx.provider.poll_count("t1") >= 1).await;

    assert!(fx.scheduler.remove_task("t1"));
    assert!(!fx.scheduler.remove_task("t1"));
    let polls = fx.provider.poll_count("t1");
    wait_until(|| fx.provider.poll_count("t2") >= polls + 3).await;
    assert!(fx.provider.poll_count("t1") <= polls + 1);
    fx.scheduler.shutdown().await;
}

#[tokio::test]
async fn persistence_failures_do_not_stop_the_loop() {
    let fx = Fixture::new(fast_policy());
    fx.history.set_fail_updates(true);
    fx.provider.script("t1", vec![MockPoll::complete(json!({}))]);
    fx.track("t1").await;
    wait_until(|| !fx.scheduler.is_task_active("t1")).await;
    assert_eq!(fx.history.record("t1").unwrap().status, TaskStatus::Pending);

    fx.history.set_fail_updates(false);
    fx.provider.script("t2", vec![MockPoll::pending(), MockPoll::complete(json!({}))]);
    fx.track("t2").await;
    wait_until(|| !fx.scheduler.is_task_active("t2")).await;
    assert_eq!(fx.history.record("t2").unwrap().status, TaskStatus::Complete);
}

#[tokio::test]
async fn refresh_adopts_missing_active_records() {
    let fx = Fixture::new(PollPolicy {
        interval: Duration::from_secs(60),
        ..fast_policy()
    });
    fx.track("known").await;
    fx.history
        .seed(MemoryHistory::active_record("orphan", TaskStatus::Processing, 2));

    assert_eq!(fx.scheduler.refresh_active_tasks().await.unwrap(), 1);
    assert_eq!(fx.scheduler.refresh_active_tasks().await.unwrap(), 0);
    assert!(fx.scheduler.is_task_active("orphan"));
    let orphan = fx
        .scheduler
        .entries()
        .into_iter()
        .find(|e| e.task_id == "orphan")
        .unwrap();
    assert_eq!(orphan.attempts, 2);
    fx.scheduler.shutdown().await;
}

#[tokio::test]
async fn concurrent_polls_are_bounded() {
    let provider = MockProvider::new().with_poll_delay(Duration::from_millis(30));
    let fx = Fixture::with_provider(
        provider,
        PollPolicy {
            max_in_flight: 2,
            ..fast_policy()
        },
    );
    for i in 0..6 {
        let task_id = format!("t{i}");
        fx.provider
            .script(&task_id, vec![MockPoll::complete(json!({}))]);
        fx.track(&task_id).await;
    }

    wait_until(|| fx.scheduler.active_count() == 0).await;
    assert_eq!(fx.provider.total_polls(), 6);
    assert!(fx.provider.peak_in_flight() <= 2);
    assert!(fx.provider.peak_in_flight() >= 1);
}
