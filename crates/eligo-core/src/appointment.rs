// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Appointment records as returned by the clinic's appointment API.
//!
//! The upstream API is inconsistent about casing and about whether numeric
//! identifiers are sent as numbers or strings, so every field accepts both
//! snake_case and camelCase names and identifiers accept either form.

use serde::{Deserialize, Deserializer, Serialize};

/// A scheduled appointment, reduced to the fields intake needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default, alias = "appointmentId", deserialize_with = "opt_i64")]
    pub appointment_id: Option<i64>,
    #[serde(default, alias = "patientId", deserialize_with = "opt_string")]
    pub patient_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub mpi: Option<String>,
    #[serde(
        default,
        alias = "fullName",
        alias = "patient_name",
        alias = "patientName",
        deserialize_with = "opt_string"
    )]
    pub full_name: Option<String>,
    #[serde(default, alias = "dateOfBirth", deserialize_with = "opt_string")]
    pub dob: Option<String>,
    #[serde(default, alias = "encounterId", deserialize_with = "opt_i64")]
    pub encounter_id: Option<i64>,
    #[serde(default, alias = "receiverCode", deserialize_with = "opt_string")]
    pub receiver_code: Option<String>,
    #[serde(default, alias = "payerCode", deserialize_with = "opt_string")]
    pub payer_code: Option<String>,
    #[serde(default, alias = "receiverName", deserialize_with = "opt_string")]
    pub receiver_name: Option<String>,
    #[serde(default, alias = "payerName", deserialize_with = "opt_string")]
    pub payer_name: Option<String>,
    #[serde(default, alias = "nationalityId", deserialize_with = "opt_string")]
    pub nationality_id: Option<String>,
    #[serde(default, alias = "uidValue", deserialize_with = "opt_string")]
    pub uid_value: Option<String>,
    #[serde(
        default,
        alias = "dhaMemberId",
        alias = "member_id",
        alias = "memberId",
        deserialize_with = "opt_string"
    )]
    pub dha_member_id: Option<String>,
    #[serde(
        default,
        alias = "specialisationName",
        alias = "specialization_name",
        alias = "specializationName",
        deserialize_with = "opt_string"
    )]
    pub specialisation_name: Option<String>,
    #[serde(
        default,
        alias = "isEmergencyAppointment",
        alias = "is_emergency_appointment",
        alias = "emergency",
        deserialize_with = "opt_flag"
    )]
    pub is_emergency: bool,
    #[serde(default)]
    pub insurance: Option<InsuranceDetails>,
}

/// Policy identifiers attached to an appointment's insurance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceDetails {
    #[serde(default, alias = "tpaPolicyId", deserialize_with = "opt_string")]
    pub tpa_policy_id: Option<String>,
    #[serde(default, alias = "insurancePolicyId", deserialize_with = "opt_string")]
    pub insurance_policy_id: Option<String>,
    #[serde(default, alias = "policyNumber", deserialize_with = "opt_string")]
    pub policy_number: Option<String>,
    #[serde(default, alias = "insHolderId", deserialize_with = "opt_string")]
    pub ins_holderid: Option<String>,
}

impl Appointment {
    /// Whether the appointment carries any payer/receiver code or name.
    pub fn has_insurance_info(&self) -> bool {
        [
            &self.receiver_code,
            &self.payer_code,
            &self.receiver_name,
            &self.payer_name,
        ]
        .into_iter()
        .any(|field| non_blank(field).is_some())
    }

    /// Whether the appointment carries a national ID (Emirates ID) value.
    pub fn has_national_id(&self) -> bool {
        self.national_id().is_some()
    }

    /// National ID, preferring `nationality_id` over `uid_value`.
    pub fn national_id(&self) -> Option<&str> {
        non_blank(&self.nationality_id).or_else(|| non_blank(&self.uid_value))
    }

    /// Patient identifier used for history records: the local patient id,
    /// falling back to the MPI.
    pub fn history_patient_id(&self) -> Option<&str> {
        non_blank(&self.patient_id).or_else(|| non_blank(&self.mpi))
    }
}

/// Returns the trimmed value when present and not blank.
pub fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Str(s)) => Some(s),
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        Some(Scalar::Bool(b)) => Some(b.to_string()),
        None => None,
    })
}

fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(n)) => Some(n),
        Some(Scalar::Str(s)) => s.trim().parse().ok(),
        Some(Scalar::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        _ => None,
    })
}

fn opt_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Int(n)) => n != 0,
        Some(Scalar::Str(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}
