// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task, index, and history record types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a verification task.
///
/// Statuses are ordered `Pending < Processing < {Complete, Error}`. `Complete`
/// and `Error` are terminal: no transition leaves them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskStatus {
    #[serde(alias = "queued")]
    Pending,
    #[serde(alias = "in_progress", alias = "running")]
    Processing,
    #[serde(alias = "completed", alias = "success")]
    Complete,
    #[serde(alias = "failed")]
    Error,
}

impl TaskStatus {
    /// Position in the status lattice. Both terminal statuses share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Complete | TaskStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Re-asserting the same non-terminal status is allowed (a repeated
    /// `pending` poll); moving backwards or out of a terminal status is not.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    /// Returns the status to record after observing `observed`.
    ///
    /// Backward observations (e.g. `pending` after `processing`) keep the
    /// current status.
    pub fn advance(self, observed: TaskStatus) -> TaskStatus {
        if self.can_transition_to(observed) {
            observed
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }
}

/// Secondary lookup dimension over tasks in the metadata store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndexKind {
    Subject,
    Patient,
    NationalId,
    Member,
    Scheduling,
}

impl IndexKind {
    pub const ALL: [IndexKind; 5] = [
        IndexKind::Subject,
        IndexKind::Patient,
        IndexKind::NationalId,
        IndexKind::Member,
        IndexKind::Scheduling,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Subject => "subject",
            IndexKind::Patient => "patient",
            IndexKind::NationalId => "national_id",
            IndexKind::Member => "member",
            IndexKind::Scheduling => "scheduling",
        }
    }
}

/// Identifier type used when submitting a verification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum IdType {
    /// National identity card (Emirates ID).
    #[serde(rename = "EMIRATESID")]
    #[strum(serialize = "EMIRATESID")]
    EmiratesId,
    /// Insurance member card number.
    #[serde(rename = "CARDNUMBER")]
    #[strum(serialize = "CARDNUMBER")]
    CardNumber,
    /// Health authority member identifier.
    #[serde(rename = "DHAMEMBERID")]
    #[strum(serialize = "DHAMEMBERID")]
    DhaMemberId,
}

/// Visit type accepted by the verification provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    Outpatient,
    Inpatient,
    Dental,
    Optical,
    Maternity,
    Psychiatry,
    Wellness,
    ChronicOut,
    Emergency,
    Life,
    TravelInsurance,
}

/// One record per submitted verification task, kept in the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Provider-assigned task identifier. Unique and immutable.
    pub task_id: String,
    /// Stable person identifier (master patient index value).
    pub subject_id: String,
    /// System-local patient identifier.
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    /// TPA or payer code the submission targeted.
    pub provider_code: String,
    pub id_type: IdType,
    pub visit_type: VisitType,
    /// Appointment identifier, when the check came from a scheduled visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_id: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskMetadata {
    /// Index entries implied by the non-empty identifying fields.
    pub fn index_entries(&self) -> Vec<(IndexKind, String)> {
        let candidates = [
            (IndexKind::Subject, Some(self.subject_id.as_str())),
            (IndexKind::Patient, Some(self.patient_id.as_str())),
            (IndexKind::NationalId, self.national_id.as_deref()),
            (IndexKind::Member, self.member_id.as_deref()),
            (IndexKind::Scheduling, self.scheduling_id.as_deref()),
        ];
        candidates
            .into_iter()
            .filter_map(|(kind, value)| {
                let value = value?.trim();
                (!value.is_empty()).then(|| (kind, value.to_string()))
            })
            .collect()
    }
}

/// Payload sent to the verification provider's submit endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub id_value: String,
    pub id_type: IdType,
    /// TPA code, or `BOTH` to search every TPA.
    pub tpa_name: String,
    pub visit_type: VisitType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpi: Option<String>,
    #[serde(rename = "patientId", default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(rename = "patientName", default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(rename = "appointmentId", default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<i64>,
    #[serde(rename = "encounterId", default, skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<i64>,
}

/// Result of a single status query against the verification provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub status: TaskStatus,
    /// Partial artifacts (screenshots, documents) produced mid-verification.
    #[serde(default, alias = "interim_results", skip_serializing_if = "Option::is_none")]
    pub interim_results: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PollResponse {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            interim_results: None,
            result: None,
            message: None,
        }
    }

    pub fn processing(interim_results: Option<serde_json::Value>) -> Self {
        Self {
            status: TaskStatus::Processing,
            interim_results,
            ..Self::pending()
        }
    }

    pub fn complete(result: serde_json::Value) -> Self {
        Self {
            status: TaskStatus::Complete,
            result: Some(result),
            ..Self::pending()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            message: Some(message.into()),
            ..Self::pending()
        }
    }
}

/// Fields supplied when a history record is first created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryRecord {
    pub clinic_id: String,
    pub task_id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub patient_mpi: Option<String>,
    pub date_of_birth: Option<String>,
    pub insurance_payer: Option<String>,
    pub appointment_id: Option<i64>,
    pub encounter_id: Option<i64>,
}

/// The richer per-task record the portal UI reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub clinic_id: String,
    pub task_id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub patient_mpi: Option<String>,
    pub date_of_birth: Option<String>,
    pub insurance_payer: Option<String>,
    pub appointment_id: Option<i64>,
    pub encounter_id: Option<i64>,
    pub status: TaskStatus,
    pub polling_attempts: u32,
    pub interim_results: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Partial update applied to a history record. `None` fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryUpdate {
    pub status: Option<TaskStatus>,
    pub polling_attempts: Option<u32>,
    pub interim_results: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl HistoryUpdate {
    /// Status and attempt count only; the shape of every non-terminal poll.
    pub fn progress(status: TaskStatus, attempts: u32) -> Self {
        Self {
            status: Some(status),
            polling_attempts: Some(attempts),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Addresses a history record either by its own id or by its task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKey<'a> {
    Record(&'a str),
    Task(&'a str),
}

/// A clinic's stored TPA configuration, used for insurance-name lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TpaConfig {
    pub clinic_id: String,
    pub ins_code: String,
    #[serde(default)]
    pub insurance_name: Option<String>,
    #[serde(default)]
    pub tpa_name: Option<String>,
    #[serde(default)]
    pub ins_payer: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use proptest::prelude::*;

    fn sample_metadata() -> TaskMetadata {
        TaskMetadata {
            task_id: "task-1".into(),
            subject_id: "MPI-100".into(),
            patient_id: "42".into(),
            patient_name: Some("Jane Roe".into()),
            national_id: Some("784-1990-1234567-1".into()),
            member_id: None,
            provider_code: "TPA001".into(),
            id_type: IdType::EmiratesId,
            visit_type: VisitType::Outpatient,
            scheduling_id: Some("  ".into()),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn index_entries_skip_empty_fields() {
        let entries = sample_metadata().index_entries();
        let kinds: Vec<IndexKind> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![IndexKind::Subject, IndexKind::Patient, IndexKind::NationalId]
        );
        assert_eq!(entries[2].1, "784-1990-1234567-1");
    }

    #[test]
    fn terminal_statuses_absorb() {
        assert!(!TaskStatus::Complete.can_transition_to(TaskStatus::Error));
        assert!(!TaskStatus::Error.can_transition_to(TaskStatus::Complete));
        assert!(!TaskStatus::Complete.can_transition_to(TaskStatus::Complete));
        assert_eq!(
            TaskStatus::Processing.advance(TaskStatus::Pending),
            TaskStatus::Processing
        );
        assert_eq!(
            TaskStatus::Pending.advance(TaskStatus::Pending),
            TaskStatus::Pending
        );
    }

    #[test]
    fn provider_status_aliases_deserialize() {
        let parsed: PollResponse =
            serde_json::from_str(r#"{"status":"completed","result":{"eligible":true}}"#).unwrap();
        assert_eq!(parsed.status, TaskStatus::Complete);
        let parsed: PollResponse =
            serde_json::from_str(r#"{"status":"in_progress","interimResults":{"screenshot":"s3://a"}}"#)
                .unwrap();
        assert_eq!(parsed.status, TaskStatus::Processing);
        assert!(parsed.interim_results.is_some());
        let parsed: PollResponse =
            serde_json::from_str(r#"{"status":"failed","error":"portal down"}"#).unwrap();
        assert_eq!(parsed.message.as_deref(), Some("portal down"));
    }

    #[test]
    fn enum_string_forms_match_wire_values() {
        assert_eq!(IdType::EmiratesId.to_string(), "EMIRATESID");
        assert_eq!(IdType::from_str("CARDNUMBER").unwrap(), IdType::CardNumber);
        assert_eq!(VisitType::ChronicOut.to_string(), "CHRONIC_OUT");
        assert_eq!(
            VisitType::from_str("TRAVEL_INSURANCE").unwrap(),
            VisitType::TravelInsurance
        );
        assert_eq!(IndexKind::NationalId.to_string(), "national_id");
        assert_eq!(TaskStatus::from_str("Complete").unwrap(), TaskStatus::Complete);
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Complete,
            TaskStatus::Error,
        ] {
            assert_eq!(status.to_string(), status.as_str());
        }
    }

    #[test]
    fn eligibility_request_uses_wire_field_names() {
        let request = EligibilityRequest {
            id_value: "784".into(),
            id_type: IdType::CardNumber,
            tpa_name: "TPA001".into(),
            visit_type: VisitType::Dental,
            mpi: None,
            patient_id: Some("42".into()),
            patient_name: None,
            appointment_id: Some(9),
            encounter_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["id_type"], "CARDNUMBER");
        assert_eq!(json["visit_type"], "DENTAL");
        assert_eq!(json["patientId"], "42");
        assert_eq!(json["appointmentId"], 9);
        assert!(json.get("mpi").is_none());
    }

    fn any_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Processing),
            Just(TaskStatus::Complete),
            Just(TaskStatus::Error),
        ]
    }

    proptest! {
        #[test]
        fn advance_never_moves_backwards(observed in proptest::collection::vec(any_status(), 0..32)) {
            let mut current = TaskStatus::Pending;
            for next in observed {
                let advanced = current.advance(next);
                prop_assert!(advanced.rank() >= current.rank());
                if current.is_terminal() {
                    prop_assert_eq!(advanced, current);
                }
                current = advanced;
            }
        }
    }
}
