// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mantys verification provider adapter for Eligo.
//!
//! Implements [`VerificationProvider`] (submit and poll) and
//! [`AppointmentSource`] (today's appointment listing) over the portal's HTTP
//! API.

pub mod client;
pub mod types;

use async_trait::async_trait;
use chrono::NaiveDate;
use eligo_config::model::MantysConfig;
use eligo_core::{
    Appointment, AppointmentSource, EligibilityRequest, EligoError, PollResponse,
    VerificationProvider,
};
use tracing::{debug, info};

pub use crate::client::MantysClient;

/// Mantys-backed verification provider and appointment source.
#[derive(Debug, Clone)]
pub struct MantysProvider {
    client: MantysClient,
}

impl MantysProvider {
    /// Creates a provider from the `[mantys]` configuration section.
    pub fn new(config: &MantysConfig) -> Result<Self, EligoError> {
        let client = MantysClient::new(
            &config.api_base_url,
            config.api_key.as_deref(),
            &config.client_id,
            config.timeout(),
        )?;
        info!(base_url = %config.api_base_url, "Mantys provider initialized");
        Ok(Self { client })
    }

    pub fn from_client(client: MantysClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VerificationProvider for MantysProvider {
    fn name(&self) -> &str {
        "mantys"
    }

    async fn submit(&self, request: &EligibilityRequest) -> Result<String, EligoError> {
        let task_id = self.client.submit(request).await?;
        info!(
            task_id = %task_id,
            tpa = %request.tpa_name,
            id_type = %request.id_type,
            visit_type = %request.visit_type,
            "verification submitted"
        );
        Ok(task_id)
    }

    async fn poll(&self, task_id: &str) -> Result<PollResponse, EligoError> {
        let response = self.client.poll(task_id).await?;
        debug!(task_id, status = %response.status, "task polled");
        Ok(response)
    }
}

#[async_trait]
impl AppointmentSource for MantysProvider {
    async fn fetch(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        customer_site_id: i64,
    ) -> Result<Vec<Appointment>, EligoError> {
        self.client
            .fetch_appointments(from, to, customer_site_id)
            .await
    }
}
