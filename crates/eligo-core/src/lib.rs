// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Eligo verification tracker.
//!
//! This crate provides the error type, the task and history record types, and
//! the collaborator traits (verification provider, history store, appointment
//! source, TPA configuration source) shared by every other crate in the
//! workspace.

pub mod appointment;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use appointment::Appointment;
pub use error::EligoError;
pub use types::{
    EligibilityRequest, HistoryKey, HistoryRecord, HistoryUpdate, IdType, IndexKind,
    NewHistoryRecord, PollResponse, TaskMetadata, TaskStatus, TpaConfig, VisitType,
};

pub use traits::{AppointmentSource, HistoryStore, TpaConfigSource, VerificationProvider};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligo_error_has_all_variants() {
        let _config = EligoError::Config("test".into());
        let _storage = EligoError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _decode = EligoError::Decode {
            key: "task-1".into(),
            source: serde_json::from_str::<u32>("nope").unwrap_err(),
        };
        let _provider = EligoError::Provider {
            message: "test".into(),
            status: Some(502),
            source: None,
        };
        let _not_found = EligoError::NotFound {
            kind: "history".into(),
            id: "h-1".into(),
        };
        let _timeout = EligoError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = EligoError::Internal("test".into());
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_provider<T: VerificationProvider>() {}
        fn _assert_history<T: HistoryStore>() {}
        fn _assert_appointments<T: AppointmentSource>() {}
        fn _assert_tpa_configs<T: TpaConfigSource>() {}
    }
}
