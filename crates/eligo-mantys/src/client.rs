// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the portal's verification and appointment endpoints.
//!
//! [`MantysClient`] builds requests, attaches authentication headers, and
//! classifies failures: responses carry their HTTP status in
//! [`EligoError::Provider`], connection failures and timeouts carry none.

use std::time::Duration;

use chrono::NaiveDate;
use eligo_core::{Appointment, EligibilityRequest, EligoError, PollResponse};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{ApiErrorBody, AppointmentsEnvelope, SubmitResponse};

const SUBMIT_PATH: [&str; 3] = ["api", "mantys", "eligibility-check"];
const APPOINTMENTS_PATH: [&str; 3] = ["api", "appointments", "today"];

/// HTTP client for the verification provider and appointment listing.
#[derive(Debug, Clone)]
pub struct MantysClient {
    client: reqwest::Client,
    base_url: Url,
    max_retries: u32,
}

impl MantysClient {
    /// Creates a client for `base_url`.
    ///
    /// `api_key`, when present, is sent as a bearer token; `client_id` is
    /// sent as `x-client-id` on every request.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        client_id: &str,
        timeout: Duration,
    ) -> Result<Self, EligoError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| EligoError::Config(format!("invalid API base URL `{base_url}`: {e}")))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    EligoError::Config(format!("invalid API key header value: {e}"))
                })?,
            );
        }
        headers.insert(
            "x-client-id",
            HeaderValue::from_str(client_id)
                .map_err(|e| EligoError::Config(format!("invalid client id header value: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| EligoError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            max_retries: 1,
        })
    }

    /// Overrides the transient-error retry budget for submissions.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, EligoError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                EligoError::Config(format!("API base URL `{}` cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Submits a verification request and returns the provider task id.
    ///
    /// Transient statuses (429, 500, 502, 503) are retried after a one-second
    /// delay, up to the retry budget.
    pub async fn submit(&self, request: &EligibilityRequest) -> Result<String, EligoError> {
        let url = self.endpoint(SUBMIT_PATH)?;
        let mut attempt = 0;
        let response = loop {
            if attempt > 0 {
                warn!(attempt, "retrying submission after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            let response = self
                .client
                .post(url.clone())
                .json(request)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            debug!(status = %status, attempt, "submission response received");

            if is_transient_error(status) && attempt < self.max_retries {
                attempt += 1;
                continue;
            }
            break response;
        };

        let body: SubmitResponse = read_json(response).await?;
        match body.task_id.filter(|id| !id.trim().is_empty()) {
            Some(task_id) => Ok(task_id),
            None => Err(EligoError::provider(
                "submission response did not contain a task id",
                None,
            )),
        }
    }

    /// Queries the status of a submitted task.
    pub async fn poll(&self, task_id: &str) -> Result<PollResponse, EligoError> {
        let url = self.endpoint(SUBMIT_PATH.into_iter().chain([task_id]))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        let body: Value = read_json(response).await?;

        // Some deployments wrap the status object in `data`.
        let body = match body {
            Value::Object(mut map) if !map.contains_key("status") && map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(body).map_err(|e| EligoError::Provider {
            message: format!("unrecognized status response for task {task_id}: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })
    }

    /// Fetches appointments between two dates for a customer site.
    ///
    /// Entries that do not parse as appointments are logged and skipped; a
    /// body without an appointment list yields an empty list.
    pub async fn fetch_appointments(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        customer_site_id: i64,
    ) -> Result<Vec<Appointment>, EligoError> {
        let mut url = self.endpoint(APPOINTMENTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("fromDate", &format_date(from))
            .append_pair("toDate", &format_date(to))
            .append_pair("customerSiteId", &customer_site_id.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        let envelope: AppointmentsEnvelope = match read_json::<Value>(response).await? {
            value @ Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            other => {
                warn!(kind = json_kind(&other), "unexpected appointments response shape");
                return Ok(Vec::new());
            }
        };

        let Some(Value::Object(mut body)) = envelope.body else {
            warn!("appointments response has no body object");
            return Ok(Vec::new());
        };
        let record_count = body.get("RecordCount").and_then(Value::as_i64).unwrap_or(0);
        let entries = match body.remove("Data") {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                warn!(kind = json_kind(&other), "appointments data is not a list");
                return Ok(Vec::new());
            }
            None => Vec::new(),
        };

        let appointments: Vec<Appointment> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value(entry) {
                Ok(appointment) => Some(appointment),
                Err(e) => {
                    warn!(index = i, error = %e, "skipping malformed appointment");
                    None
                }
            })
            .collect();
        debug!(
            fetched = appointments.len(),
            record_count, "appointments fetched"
        );
        Ok(appointments)
    }
}

/// Reads a successful JSON body, or turns a failure status into an error
/// that carries the status code.
async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, EligoError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| EligoError::Provider {
        message: format!("failed to read response body: {e}"),
        status: Some(status.as_u16()),
        source: Some(Box::new(e)),
    })?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.summary())
            .unwrap_or(body);
        return Err(EligoError::provider(
            format!("API returned {status}: {detail}"),
            Some(status.as_u16()),
        ));
    }

    serde_json::from_str(&body).map_err(|e| EligoError::Provider {
        message: format!("failed to parse API response: {e}"),
        status: None,
        source: Some(Box::new(e)),
    })
}

fn transport_error(e: reqwest::Error) -> EligoError {
    let message = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        format!("HTTP request failed: {e}")
    };
    EligoError::Provider {
        message,
        status: e.status().map(|s| s.as_u16()),
        source: Some(Box::new(e)),
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// The appointment API expects `MM/DD/YYYY`.
fn format_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
