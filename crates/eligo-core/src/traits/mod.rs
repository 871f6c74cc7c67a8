// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Every trait uses `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` and swapped for mocks in tests.

pub mod appointments;
pub mod history;
pub mod provider;
pub mod tpa;

pub use appointments::AppointmentSource;
pub use history::HistoryStore;
pub use provider::VerificationProvider;
pub use tpa::TpaConfigSource;
