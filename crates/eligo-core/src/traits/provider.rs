// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification provider trait (the external eligibility-check service).

use async_trait::async_trait;

use crate::error::EligoError;
use crate::types::{EligibilityRequest, PollResponse};

/// An external service that runs eligibility verifications asynchronously.
///
/// Submissions are at-least-once; polling the same task repeatedly is safe.
#[async_trait]
pub trait VerificationProvider: Send + Sync + 'static {
    /// Human-readable name of this provider, used in logs.
    fn name(&self) -> &str;

    /// Submits a verification and returns the provider-assigned task id.
    async fn submit(&self, request: &EligibilityRequest) -> Result<String, EligoError>;

    /// Queries the current status of a previously submitted task.
    ///
    /// Transport and protocol failures are returned as
    /// [`EligoError::Provider`]; a task the provider itself marked as failed
    /// is an `Ok` response with status `error`.
    async fn poll(&self, task_id: &str) -> Result<PollResponse, EligoError>;
}
