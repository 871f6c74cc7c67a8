// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Eligo verification tracker.

use thiserror::Error;

/// The primary error type used across all Eligo crates.
#[derive(Debug, Error)]
pub enum EligoError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A stored payload could not be decoded.
    #[error("failed to decode stored record `{key}`: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    /// Verification provider or upstream API errors.
    ///
    /// `status` carries the HTTP status code when the upstream answered at all;
    /// connection failures and timeouts leave it empty.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A record required by the caller does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EligoError {
    /// Builds a provider error without an underlying source.
    pub fn provider(message: impl Into<String>, status: Option<u16>) -> Self {
        EligoError::Provider {
            message: message.into(),
            status,
            source: None,
        }
    }

    /// Returns true when the failure was reported by the upstream side
    /// (HTTP 5xx). Such failures get a larger retry budget while polling.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, EligoError::Provider { status: Some(code), .. } if *code >= 500)
    }

    /// HTTP status code attached to a provider error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EligoError::Provider { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_fault_requires_5xx_status() {
        assert!(EligoError::provider("bad gateway", Some(502)).is_server_fault());
        assert!(EligoError::provider("internal", Some(500)).is_server_fault());
        assert!(!EligoError::provider("not found", Some(404)).is_server_fault());
        assert!(!EligoError::provider("connection refused", None).is_server_fault());
        assert!(!EligoError::Internal("x".into()).is_server_fault());
    }

    #[test]
    fn status_code_only_for_provider_errors() {
        assert_eq!(EligoError::provider("x", Some(429)).status_code(), Some(429));
        assert_eq!(EligoError::Config("x".into()).status_code(), None);
    }

    #[test]
    fn display_includes_message() {
        let err = EligoError::provider("upstream returned 503", Some(503));
        assert_eq!(err.to_string(), "provider error: upstream returned 503");
        let err = EligoError::NotFound {
            kind: "history record".into(),
            id: "h-9".into(),
        };
        assert_eq!(err.to_string(), "history record not found: h-9");
    }
}
