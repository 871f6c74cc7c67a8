// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Eligo verification tracker.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Eligo configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EligoConfig {
    /// Service identity and log level.
    #[serde(default)]
    pub service: ServiceConfig,

    /// SQLite database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Verification provider (Mantys) API settings.
    #[serde(default)]
    pub mantys: MantysConfig,

    /// Polling scheduler settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Metadata store retention settings.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Automatic appointment intake settings.
    #[serde(default)]
    pub intake: IntakeConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "eligo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable SQLite WAL mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("eligo").join("eligo.db"))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "eligo.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Verification provider API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MantysConfig {
    /// Base URL of the provider API, without a trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// API key sent as a bearer token. `None` sends no authorization header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Client identifier sent with every request.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Clinic that owns the history records this instance creates.
    #[serde(default)]
    pub clinic_id: Option<String>,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MantysConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            client_id: default_client_id(),
            clinic_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MantysConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_base_url() -> String {
    "https://aster.api.mantys.org".to_string()
}

fn default_client_id() -> String {
    "aster-clinic".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Polling scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Milliseconds between scheduler ticks.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Polls per task before it is failed with a timeout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Consecutive HTTP 5xx failures tolerated before a task is failed.
    #[serde(default = "default_server_failure_limit")]
    pub server_failure_limit: u32,

    /// Consecutive non-5xx transport failures tolerated before a task is failed.
    #[serde(default = "default_failure_limit")]
    pub failure_limit: u32,

    /// Upper bound on concurrent polls within one tick.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
            server_failure_limit: default_server_failure_limit(),
            failure_limit: default_failure_limit(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    400
}

fn default_server_failure_limit() -> u32 {
    5
}

fn default_failure_limit() -> u32 {
    3
}

fn default_max_in_flight() -> usize {
    8
}

/// Metadata store retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    /// Days an entry lives after its last write.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Seconds between sweeps of expired rows in `serve` mode.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl MetadataConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

fn default_retention_days() -> u32 {
    90
}

fn default_purge_interval_secs() -> u64 {
    3600
}

/// Automatic appointment intake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntakeConfig {
    /// Run the intake loop alongside the scheduler in `serve` mode.
    #[serde(default)]
    pub enabled: bool,

    /// Site whose appointments are fetched.
    #[serde(default = "default_customer_site_id")]
    pub customer_site_id: i64,

    /// Clinic whose TPA configurations drive insurance-name mapping.
    #[serde(default = "default_intake_clinic_id")]
    pub clinic_id: String,

    /// Seconds between intake passes in continuous mode.
    #[serde(default = "default_intake_interval_secs")]
    pub interval_secs: u64,

    /// Days a successfully processed appointment stays marked.
    #[serde(default = "default_processed_ttl_days")]
    pub processed_ttl_days: u32,

    /// Hours a failed appointment stays marked before it may be retried.
    #[serde(default = "default_error_ttl_hours")]
    pub error_ttl_hours: u32,

    /// Seconds a clinic's insurance-name mapping is cached.
    #[serde(default = "default_tpa_cache_ttl_secs")]
    pub tpa_cache_ttl_secs: u64,

    /// Insurance name to TPA code pairs consulted when the clinic's stored
    /// TPA configurations have no match.
    #[serde(default)]
    pub tpa_fallbacks: BTreeMap<String, String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            customer_site_id: default_customer_site_id(),
            clinic_id: default_intake_clinic_id(),
            interval_secs: default_intake_interval_secs(),
            processed_ttl_days: default_processed_ttl_days(),
            error_ttl_hours: default_error_ttl_hours(),
            tpa_cache_ttl_secs: default_tpa_cache_ttl_secs(),
            tpa_fallbacks: BTreeMap::new(),
        }
    }
}

impl IntakeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn processed_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.processed_ttl_days) * 24 * 60 * 60)
    }

    pub fn error_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.error_ttl_hours) * 60 * 60)
    }

    pub fn tpa_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.tpa_cache_ttl_secs)
    }
}

fn default_customer_site_id() -> i64 {
    31
}

fn default_intake_clinic_id() -> String {
    "aster-clinic".to_string()
}

fn default_intake_interval_secs() -> u64 {
    10
}

fn default_processed_ttl_days() -> u32 {
    7
}

fn default_error_ttl_hours() -> u32 {
    24
}

fn default_tpa_cache_ttl_secs() -> u64 {
    300
}
