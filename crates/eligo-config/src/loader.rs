// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./eligo.toml` > `~/.config/eligo/eligo.toml` > `/etc/eligo/eligo.toml`
//! with environment variable overrides via `ELIGO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::EligoConfig;

/// Path of the system-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/eligo/eligo.toml";

/// File name of the local (working directory) configuration file.
pub const LOCAL_CONFIG_FILE: &str = "eligo.toml";

/// Config sections, in the order they are matched against env var names.
const SECTIONS: [&str; 6] = ["service", "storage", "mantys", "polling", "metadata", "intake"];

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("eligo").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/eligo/eligo.toml` (system-wide)
/// 3. `~/.config/eligo/eligo.toml` (user XDG config)
/// 4. `./eligo.toml` (local directory)
/// 5. `ELIGO_*` environment variables
pub fn load_config() -> Result<EligoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<EligoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EligoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EligoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EligoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for XDG config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(EligoConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Uses `Env::map()` rather than `Env::split("_")`: key names contain
/// underscores, so `ELIGO_POLLING_MAX_ATTEMPTS` must become
/// `polling.max_attempts`, not `polling.max.attempts`.
fn env_provider() -> Env {
    Env::prefixed("ELIGO_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a prefix-stripped env var name to a dotted, lowercase config path.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
