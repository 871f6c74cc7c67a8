// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted verification provider for deterministic testing.
//!
//! `MockProvider` implements `VerificationProvider` with per-task poll
//! scripts. Each poll pops the next step; the last step of a script repeats
//! forever, so a script of `[pending, complete]` answers `complete` on every
//! poll after the first. Unscripted tasks answer `pending`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use eligo_core::{EligibilityRequest, EligoError, PollResponse, VerificationProvider};

/// One scripted answer to a poll.
#[derive(Debug, Clone)]
pub enum MockPoll {
    /// The provider answered with this response.
    Respond(PollResponse),
    /// The call failed; `status` is the HTTP status, if the upstream answered.
    Fail { status: Option<u16>, message: String },
}

impl MockPoll {
    pub fn pending() -> Self {
        MockPoll::Respond(PollResponse::pending())
    }

    pub fn processing(interim: serde_json::Value) -> Self {
        MockPoll::Respond(PollResponse::processing(Some(interim)))
    }

    pub fn complete(result: serde_json::Value) -> Self {
        MockPoll::Respond(PollResponse::complete(result))
    }

    pub fn error(message: &str) -> Self {
        MockPoll::Respond(PollResponse::error(message))
    }

    /// An HTTP 5xx answer.
    pub fn server_failure() -> Self {
        MockPoll::Fail {
            status: Some(503),
            message: "service unavailable".to_string(),
        }
    }

    /// A failure without an HTTP status, such as a refused connection.
    pub fn network_failure() -> Self {
        MockPoll::Fail {
            status: None,
            message: "connection refused".to_string(),
        }
    }

    fn into_result(self) -> Result<PollResponse, EligoError> {
        match self {
            MockPoll::Respond(response) => Ok(response),
            MockPoll::Fail { status, message } => Err(EligoError::provider(message, status)),
        }
    }
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, VecDeque<MockPoll>>,
    polls: HashMap<String, usize>,
    submissions: Vec<EligibilityRequest>,
    submit_failure: Option<String>,
}

/// A verification provider that answers from pre-configured scripts.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<State>,
    next_task: AtomicUsize,
    poll_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every poll by `delay` before answering.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the poll script for `task_id`.
    pub fn script(&self, task_id: &str, steps: Vec<MockPoll>) {
        self.state()
            .scripts
            .insert(task_id.to_string(), VecDeque::from(steps));
    }

    /// Make every following `submit` fail with `message`.
    pub fn fail_submissions(&self, message: &str) {
        self.state().submit_failure = Some(message.to_string());
    }

    /// Number of polls received for `task_id`.
    pub fn poll_count(&self, task_id: &str) -> usize {
        self.state().polls.get(task_id).copied().unwrap_or(0)
    }

    /// Polls received across every task.
    pub fn total_polls(&self) -> usize {
        self.state().polls.values().sum()
    }

    /// Every request passed to `submit`, in order.
    pub fn submissions(&self) -> Vec<EligibilityRequest> {
        self.state().submissions.clone()
    }

    /// Highest number of polls observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, task_id: &str) -> MockPoll {
        let mut state = self.state();
        *state.polls.entry(task_id.to_string()).or_insert(0) += 1;
        match state.scripts.get_mut(task_id) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap_or_else(MockPoll::pending),
            Some(steps) => steps.front().cloned().unwrap_or_else(MockPoll::pending),
            None => MockPoll::pending(),
        }
    }
}

#[async_trait]
impl VerificationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    async fn submit(&self, request: &EligibilityRequest) -> Result<String, EligoError> {
        let mut state = self.state();
        if let Some(message) = &state.submit_failure {
            return Err(EligoError::provider(message.clone(), Some(400)));
        }
        state.submissions.push(request.clone());
        let n = self.next_task.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("mock-task-{n}"))
    }

    async fn poll(&self, task_id: &str) -> Result<PollResponse, EligoError> {
        let step = self.next_step(task_id);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        step.into_result()
    }
}
