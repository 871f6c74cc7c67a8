// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chooses which patient identifier a verification is submitted under.

use eligo_core::appointment::non_blank;
use eligo_core::{Appointment, IdType};

/// The identifier type and value to submit, in priority order: an insurance
/// card number, the national ID, then the health authority member ID.
pub fn determine_identity(appointment: &Appointment) -> Option<(IdType, String)> {
    if let Some(insurance) = &appointment.insurance {
        let card = [
            &insurance.tpa_policy_id,
            &insurance.insurance_policy_id,
            &insurance.policy_number,
            &insurance.ins_holderid,
        ]
        .into_iter()
        .find_map(non_blank);
        if let Some(card) = card {
            return Some((IdType::CardNumber, card.to_string()));
        }
    }
    if let Some(national_id) = appointment.national_id() {
        return Some((IdType::EmiratesId, national_id.to_string()));
    }
    non_blank(&appointment.dha_member_id).map(|id| (IdType::DhaMemberId, id.to_string()))
}
