// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous verification tracking for Eligo.
//!
//! A [`Tracker`] submits verifications to a provider, indexes them in the
//! metadata store, and hands them to the [`PollingScheduler`], which polls
//! each task until the provider reports a result, the task fails, or the
//! attempt ceiling is reached.

pub mod policy;
pub mod registry;
pub mod scheduler;
pub mod tracker;

pub use policy::{Outcome, PollPolicy, Step};
pub use registry::{Registry, RegistryEntry};
pub use scheduler::PollingScheduler;
pub use tracker::{SubmittedTask, Submission, Tracker};
