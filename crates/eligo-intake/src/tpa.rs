// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TPA code extraction.
//!
//! Codes come from the appointment's receiver and payer code fields when
//! they look like provider codes, otherwise from the receiver and payer
//! names mapped through the clinic's stored TPA configurations, otherwise
//! from a configured fallback table.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use eligo_core::appointment::non_blank;
use eligo_core::{Appointment, TpaConfig, TpaConfigSource};

static TPA_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^TPA[0-9A-Z]+$").expect("static TPA pattern"));
static INS_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^INS[0-9A-Z]+$").expect("static INS pattern"));
static OTHER_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(D|DHPO|RIYATI)[0-9A-Z]*$").expect("static payer pattern"));

/// Searches every TPA the provider supports.
pub const ALL_TPAS: &str = "BOTH";

fn is_primary_code(code: &str) -> bool {
    TPA_CODE.is_match(code) || INS_CODE.is_match(code)
}

/// Whether `code` is a TPA code the provider accepts.
pub fn is_valid_tpa_code(code: &str) -> bool {
    let code = code.trim();
    code == ALL_TPAS || is_primary_code(code) || OTHER_CODE.is_match(code)
}

/// Code taken directly from the receiver/payer code fields: TPA/INS codes
/// first (receiver before payer), then D/DHPO/RIYATI codes.
pub fn code_from_fields(appointment: &Appointment) -> Option<String> {
    let receiver = non_blank(&appointment.receiver_code);
    let payer = non_blank(&appointment.payer_code);
    [receiver, payer]
        .into_iter()
        .flatten()
        .find(|code| is_primary_code(code))
        .or_else(|| {
            [receiver, payer]
                .into_iter()
                .flatten()
                .find(|code| OTHER_CODE.is_match(code))
        })
        .map(str::to_string)
}

fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Build the normalized insurance-name to code map for one clinic.
///
/// `insurance_name` entries take precedence over `tpa_name`, which takes
/// precedence over `ins_payer`. `tpa_name` is only used by configurations
/// without an `insurance_name`.
pub fn build_name_map(configs: &[TpaConfig]) -> HashMap<String, String> {
    let usable: Vec<&TpaConfig> = configs
        .iter()
        .filter(|c| !c.ins_code.trim().is_empty())
        .collect();
    let mut names = HashMap::new();

    for config in &usable {
        if let Some(name) = non_blank(&config.insurance_name) {
            names.insert(normalize(name), config.ins_code.clone());
        }
    }
    for config in usable.iter().filter(|c| non_blank(&c.insurance_name).is_none()) {
        if let Some(name) = non_blank(&config.tpa_name) {
            names
                .entry(normalize(name))
                .or_insert_with(|| config.ins_code.clone());
        }
    }
    for config in &usable {
        if let Some(payer) = non_blank(&config.ins_payer) {
            names
                .entry(normalize(payer))
                .or_insert_with(|| config.ins_code.clone());
        }
    }
    names
}

struct CachedNames {
    loaded_at: Instant,
    names: Arc<HashMap<String, String>>,
}

/// Read-through cache of each clinic's insurance-name map.
///
/// A clinic's map is loaded on first use and reloaded once it is older than
/// the TTL. Load failures are logged and yield an empty map that is not
/// cached.
pub struct TpaNameCache {
    source: Arc<dyn TpaConfigSource>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedNames>>,
}

impl TpaNameCache {
    pub fn new(source: Arc<dyn TpaConfigSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The insurance-name map for `clinic_id`.
    pub async fn names(&self, clinic_id: &str) -> Arc<HashMap<String, String>> {
        if let Some(cached) = self.entries.read().await.get(clinic_id)
            && cached.loaded_at.elapsed() < self.ttl
        {
            return Arc::clone(&cached.names);
        }

        let configs = match self.source.tpa_configs(clinic_id).await {
            Ok(configs) => configs,
            Err(err) => {
                error!(clinic_id, error = %err, "failed to load TPA configurations");
                return Arc::new(HashMap::new());
            }
        };
        let names = Arc::new(build_name_map(&configs));
        info!(clinic_id, mappings = names.len(), "loaded insurance name mappings");
        self.entries.write().await.insert(
            clinic_id.to_string(),
            CachedNames {
                loaded_at: Instant::now(),
                names: Arc::clone(&names),
            },
        );
        names
    }

    /// Code mapped to `name` for `clinic_id`, matched case-insensitively.
    pub async fn lookup(&self, clinic_id: &str, name: &str) -> Option<String> {
        self.names(clinic_id).await.get(&normalize(name)).cloned()
    }

    /// Drop `clinic_id`'s map so the next lookup reloads it.
    pub async fn invalidate(&self, clinic_id: &str) {
        self.entries.write().await.remove(clinic_id);
    }
}

/// Full TPA code resolution for an appointment.
pub struct TpaResolver {
    cache: TpaNameCache,
    fallbacks: HashMap<String, String>,
}

impl TpaResolver {
    pub fn new(cache: TpaNameCache, fallbacks: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            cache,
            fallbacks: fallbacks
                .into_iter()
                .map(|(name, code)| (normalize(&name), code))
                .collect(),
        }
    }

    pub fn cache(&self) -> &TpaNameCache {
        &self.cache
    }

    /// Resolve the TPA code for `appointment`, consulting `clinic_id`'s
    /// stored configurations for name matches. `None` when nothing matched.
    pub async fn resolve(&self, appointment: &Appointment, clinic_id: &str) -> Option<String> {
        if let Some(code) = code_from_fields(appointment) {
            debug!(code = %code, "TPA code from appointment code fields");
            return Some(code);
        }

        let names = [
            non_blank(&appointment.receiver_name),
            non_blank(&appointment.payer_name),
        ];
        if names.iter().all(Option::is_none) {
            return None;
        }

        let mapping = self.cache.names(clinic_id).await;
        for name in names.into_iter().flatten() {
            let key = normalize(name);
            if let Some(code) = mapping.get(&key) {
                debug!(insurance_name = name, code = %code, "TPA code from clinic configuration");
                return Some(code.clone());
            }
            if let Some(code) = self.fallbacks.get(&key) {
                debug!(insurance_name = name, code = %code, "TPA code from fallback table");
                return Some(code.clone());
            }
        }

        warn!(
            receiver_code = ?appointment.receiver_code,
            payer_code = ?appointment.payer_code,
            receiver_name = ?appointment.receiver_name,
            payer_name = ?appointment.payer_name,
            "could not determine TPA code"
        );
        None
    }
}
