// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automatic eligibility checks for the day's scheduled appointments.
//!
//! [`AutoChecker`] fetches appointments, derives the TPA code, visit type,
//! and patient identifier for each one, submits a verification through the
//! [`Tracker`](eligo_tracker::Tracker), and marks the appointment so later
//! passes skip it.

pub mod checker;
pub mod identity;
pub mod tpa;
pub mod visit_type;

pub use checker::{AutoChecker, IntakeMetrics};
pub use identity::determine_identity;
pub use tpa::{TpaNameCache, TpaResolver, is_valid_tpa_code};
pub use visit_type::{determine_visit_type, is_valid_visit_type};
