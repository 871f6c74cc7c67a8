// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths, positive limits, and URL shape.

use tracing::warn;

use crate::diagnostic::ConfigError;
use crate::model::EligoConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &EligoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let base_url = config.mantys.api_base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "mantys.api_base_url `{base_url}` must start with http:// or https://"
        ));
    } else if base_url.contains("localhost") || base_url.contains("127.0.0.1") {
        warn!(url = base_url, "mantys.api_base_url points at a local address");
    }

    if config.mantys.timeout_secs == 0 {
        fail("mantys.timeout_secs must be greater than 0".to_string());
    }

    let polling = &config.polling;
    for (name, value) in [
        ("polling.interval_ms", polling.interval_ms),
        ("polling.max_attempts", u64::from(polling.max_attempts)),
        (
            "polling.server_failure_limit",
            u64::from(polling.server_failure_limit),
        ),
        ("polling.failure_limit", u64::from(polling.failure_limit)),
        ("polling.max_in_flight", polling.max_in_flight as u64),
    ] {
        if value == 0 {
            fail(format!("{name} must be greater than 0"));
        }
    }

    if config.metadata.retention_days == 0 {
        fail("metadata.retention_days must be greater than 0".to_string());
    }
    if config.metadata.purge_interval_secs == 0 {
        fail("metadata.purge_interval_secs must be greater than 0".to_string());
    }

    let intake = &config.intake;
    if intake.enabled {
        if intake.clinic_id.trim().is_empty() {
            fail("intake.clinic_id must not be empty when intake is enabled".to_string());
        }
        if intake.customer_site_id <= 0 {
            fail(format!(
                "intake.customer_site_id must be positive, got {}",
                intake.customer_site_id
            ));
        }
    }
    if intake.interval_secs == 0 {
        fail("intake.interval_secs must be greater than 0".to_string());
    }
    if intake.processed_ttl_days == 0 {
        fail("intake.processed_ttl_days must be greater than 0".to_string());
    }
    if intake.error_ttl_hours == 0 {
        fail("intake.error_ttl_hours must be greater than 0".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
