// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Visit type derivation from appointment data.

use std::str::FromStr;

use eligo_core::{Appointment, VisitType};
use tracing::debug;

/// Specialisation keywords, checked in order against the uppercased
/// specialisation name.
const SPECIALISATION_KEYWORDS: &[(&str, VisitType)] = &[
    ("DENTAL", VisitType::Dental),
    ("DENTIST", VisitType::Dental),
    ("OPTICAL", VisitType::Optical),
    ("OPTOMETRIST", VisitType::Optical),
    ("OPHTHALMOLOGIST", VisitType::Optical),
    ("EYE", VisitType::Optical),
    ("MATERNITY", VisitType::Maternity),
    ("OBSTETRIC", VisitType::Maternity),
    ("GYNECOLOG", VisitType::Maternity),
    ("PSYCHIATRY", VisitType::Psychiatry),
    ("PSYCHIATRIST", VisitType::Psychiatry),
    ("MENTAL", VisitType::Psychiatry),
    ("WELLNESS", VisitType::Wellness),
];

/// Specialisation keyword match first, then the emergency flag, otherwise
/// outpatient.
pub fn determine_visit_type(appointment: &Appointment) -> VisitType {
    if let Some(name) = appointment.specialisation_name.as_deref() {
        let upper = name.to_uppercase();
        if let Some((keyword, visit_type)) = SPECIALISATION_KEYWORDS
            .iter()
            .find(|(keyword, _)| upper.contains(keyword))
        {
            debug!(specialisation = name, keyword, visit_type = %visit_type, "visit type from specialisation");
            return *visit_type;
        }
    }
    if appointment.is_emergency {
        return VisitType::Emergency;
    }
    VisitType::Outpatient
}

/// Whether `value` names one of the provider's visit types.
pub fn is_valid_visit_type(value: &str) -> bool {
    VisitType::from_str(value).is_ok()
}
