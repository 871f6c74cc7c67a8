// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Eligo integration tests.
//!
//! Provides scripted adapters and a temp-database harness for fast,
//! deterministic tests without a live verification provider.
//!
//! # Components
//!
//! - [`MockProvider`] - Verification provider with scripted poll responses
//! - [`MemoryHistory`] - In-memory history store with failure injection
//! - [`TestHarness`] - Temp SQLite database with every store opened on it

pub mod harness;
pub mod memory_history;
pub mod mock_provider;

pub use harness::TestHarness;
pub use memory_history::MemoryHistory;
pub use mock_provider::{MockPoll, MockProvider};
