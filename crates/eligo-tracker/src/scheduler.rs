// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic polling loop that drives every registered task to a terminal
//! status.
//!
//! A single loop task per scheduler polls a snapshot of the registry once per
//! tick, with at most `max_in_flight` polls running at a time. The loop is
//! spawned when the first task is added and exits once the registry drains;
//! the next `add_task` spawns a fresh one. The registry lock is only ever held
//! for synchronous bookkeeping, never across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use eligo_core::{EligoError, HistoryKey, HistoryRecord, HistoryStore, VerificationProvider};
use eligo_storage::MetadataStore;

use crate::policy::{Outcome, PollPolicy, Step};
use crate::registry::{Registry, RegistryEntry};

/// Handle to the running loop task.
struct Driver {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    registry: Registry,
    driver: Option<Driver>,
    generation: u64,
    stopped: bool,
    initialized: bool,
}

impl State {
    /// Forget the driver if it is still the one identified by `generation`.
    fn release(&mut self, generation: u64) {
        if self.driver.as_ref().is_some_and(|d| d.generation == generation) {
            self.driver = None;
        }
    }

    fn adopt(&mut self, records: &[HistoryRecord]) -> usize {
        records
            .iter()
            .filter(|record| !record.status.is_terminal())
            .filter(|record| self.registry.insert(RegistryEntry::from_record(record)))
            .count()
    }
}

struct Inner {
    provider: Arc<dyn VerificationProvider>,
    history: Arc<dyn HistoryStore>,
    metadata: Option<MetadataStore>,
    policy: PollPolicy,
    state: Mutex<State>,
}

/// Polls the verification provider for every active task and records each
/// observation in the history store and, when configured, the metadata store.
///
/// Cloning is cheap; clones share one registry and one loop.
#[derive(Clone)]
pub struct PollingScheduler {
    inner: Arc<Inner>,
}

impl PollingScheduler {
    pub fn new(
        provider: Arc<dyn VerificationProvider>,
        history: Arc<dyn HistoryStore>,
        metadata: Option<MetadataStore>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                history,
                metadata,
                policy,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.inner.policy
    }

    /// Rebuild the registry from the history store's active records and
    /// start polling them.
    ///
    /// Only the first successful call reads the history store. Any call also
    /// resumes a scheduler halted by [`shutdown`](Self::shutdown). A listing
    /// failure is logged and returned, leaves the registry empty, and lets a
    /// later call retry. Returns the number of tasks restored.
    pub async fn initialize(&self) -> Result<usize, EligoError> {
        {
            let mut state = self.inner.lock();
            if state.initialized {
                state.stopped = false;
                self.start_locked(&mut state);
                return Ok(0);
            }
        }

        let records = match self.inner.history.list_active().await {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "failed to load active tasks from history");
                return Err(err);
            }
        };

        let mut state = self.inner.lock();
        let restored = state.adopt(&records);
        state.initialized = true;
        state.stopped = false;
        self.start_locked(&mut state);
        info!(restored, "polling scheduler initialized");
        Ok(restored)
    }

    /// Add active history records that are missing from the registry.
    /// Returns how many were added.
    pub async fn refresh_active_tasks(&self) -> Result<usize, EligoError> {
        let records = self.inner.history.list_active().await?;
        let mut state = self.inner.lock();
        let added = state.adopt(&records);
        self.start_locked(&mut state);
        if added > 0 {
            info!(added, "adopted active tasks from history");
        }
        Ok(added)
    }

    /// Start tracking `task_id`, whose progress is written to history record
    /// `record_id`. Adding a task that is already tracked is a no-op.
    ///
    /// Must be called from within a Tokio runtime. Returns true when the
    /// task was newly added.
    pub fn add_task(&self, task_id: &str, record_id: &str) -> bool {
        let mut state = self.inner.lock();
        let added = state.registry.insert(RegistryEntry::new(task_id, record_id));
        if added {
            debug!(task_id, record_id, "task added to polling registry");
        }
        self.start_locked(&mut state);
        added
    }

    /// Stop tracking `task_id` without touching its history record.
    pub fn remove_task(&self, task_id: &str) -> bool {
        let removed = self.inner.lock().registry.remove(task_id).is_some();
        if removed {
            debug!(task_id, "task removed from polling registry");
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().registry.len()
    }

    pub fn is_task_active(&self, task_id: &str) -> bool {
        self.inner.lock().registry.contains(task_id)
    }

    /// Copy of every tracked entry, oldest first.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.inner.lock().registry.snapshot()
    }

    /// Whether a loop task is currently alive.
    pub fn is_running(&self) -> bool {
        self.inner.lock().driver.is_some()
    }

    /// Halt the loop and wait for an in-progress tick to finish.
    ///
    /// Registry contents and non-terminal history records are left as they
    /// are, so a restarted process re-adopts the same tasks.
    pub async fn shutdown(&self) {
        let driver = {
            let mut state = self.inner.lock();
            state.stopped = true;
            state.driver.take()
        };
        if let Some(driver) = driver {
            driver.cancel.cancel();
            if let Err(err) = driver.handle.await {
                warn!(error = %err, "polling loop ended abnormally");
            }
        }
        info!(active = self.active_count(), "polling scheduler stopped");
    }

    fn start_locked(&self, state: &mut State) {
        if state.stopped || state.driver.is_some() || state.registry.is_empty() {
            return;
        }
        state.generation += 1;
        let generation = state.generation;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.inner),
            generation,
            cancel.clone(),
        ));
        state.driver = Some(Driver {
            generation,
            cancel,
            handle,
        });
    }
}

async fn run_loop(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    let period = inner.policy.interval.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first immediate tick.
    interval.tick().await;
    debug!(generation, interval_ms = period.as_millis() as u64, "polling loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "polling loop cancelled");
                return;
            }
            _ = interval.tick() => {}
        }
        if !inner.tick(generation).await {
            break;
        }
    }
    debug!(generation, "polling loop idle, registry empty");
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Poll every task in a registry snapshot. Returns false once the
    /// registry is empty and this loop should exit.
    async fn tick(&self, generation: u64) -> bool {
        let snapshot = {
            let mut state = self.lock();
            if state.registry.is_empty() {
                state.release(generation);
                return false;
            }
            state.registry.snapshot()
        };
        debug!(tasks = snapshot.len(), "polling tick");

        futures::stream::iter(snapshot)
            .for_each_concurrent(self.policy.max_in_flight, |entry| self.poll_one(entry))
            .await;

        let mut state = self.lock();
        if state.registry.is_empty() {
            state.release(generation);
            return false;
        }
        true
    }

    async fn poll_one(&self, entry: RegistryEntry) {
        let result = self.provider.poll(&entry.task_id).await;

        let step = {
            let mut state = self.lock();
            let Some(live) = state.registry.get_mut(&entry.task_id) else {
                debug!(task_id = %entry.task_id, "task removed during poll, result discarded");
                return;
            };
            let step = self.policy.evaluate(live, result, Utc::now());
            if step.outcome.is_terminal() {
                state.registry.remove(&entry.task_id);
            }
            step
        };

        log_step(&entry, &step);
        self.persist(&entry, step).await;
    }

    async fn persist(&self, entry: &RegistryEntry, step: Step) {
        let status = step.status();
        let completed_at = step.update.completed_at;

        if let Err(err) = self
            .history
            .update(HistoryKey::Record(&entry.record_id), step.update)
            .await
        {
            error!(
                task_id = %entry.task_id,
                record_id = %entry.record_id,
                error = %err,
                "failed to persist polling progress"
            );
        }

        let (Some(metadata), Some(status), true) = (&self.metadata, status, step.status_changed)
        else {
            return;
        };
        if let Err(err) = metadata
            .update_status(&entry.task_id, status, completed_at)
            .await
        {
            warn!(task_id = %entry.task_id, error = %err, "failed to mirror status into metadata store");
        }
    }
}

fn log_step(entry: &RegistryEntry, step: &Step) {
    let task_id = entry.task_id.as_str();
    let attempts = step.update.polling_attempts.unwrap_or_default();
    match &step.outcome {
        Outcome::InProgress => {
            debug!(task_id, attempts, status = ?step.status(), "task still in progress");
        }
        Outcome::Retrying {
            failures,
            limit,
            error,
        } => {
            warn!(task_id, attempts, failures, limit, error = %error, "poll failed, will retry");
        }
        Outcome::Completed => {
            let elapsed_secs = (Utc::now() - entry.started_at).num_seconds();
            info!(task_id, attempts, elapsed_secs, "verification complete");
        }
        Outcome::Rejected => {
            warn!(task_id, attempts, reason = ?step.update.error, "provider reported verification failure");
        }
        Outcome::Unreachable => {
            error!(task_id, attempts, reason = ?step.update.error, "giving up on task after repeated poll failures");
        }
        Outcome::TimedOut => {
            warn!(task_id, attempts, "verification timed out");
        }
    }
}
