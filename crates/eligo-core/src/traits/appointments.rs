// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Appointment source trait.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::appointment::Appointment;
use crate::error::EligoError;

/// Supplies scheduled appointments for automatic eligibility checks.
#[async_trait]
pub trait AppointmentSource: Send + Sync + 'static {
    /// Appointments scheduled between `from` and `to` (inclusive) for a site.
    async fn fetch(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        customer_site_id: i64,
    ) -> Result<Vec<Appointment>, EligoError>;
}
