// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the verification and appointment endpoints.

use serde::Deserialize;

/// Response to a verification submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, alias = "taskId")]
    pub task_id: Option<String>,
}

/// Error body returned by the portal API on failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, alias = "message")]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn summary(&self) -> Option<String> {
        match (&self.error, &self.details) {
            (Some(error), Some(details)) => Some(format!("{error} ({details})")),
            (Some(error), None) => Some(error.clone()),
            (None, Some(details)) => Some(details.to_string()),
            (None, None) => None,
        }
    }
}

/// Envelope of the appointments listing: `{"body": {"Data": [...], "RecordCount": n}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentsEnvelope {
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}
