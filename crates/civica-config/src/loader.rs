// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./civica.toml` > `~/.config/civica/civica.toml` > `/etc/civica/civica.toml`
//! with environment variable overrides via `CIVICA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CivicaConfig;

/// Config sections that `CIVICA_<SECTION>_<KEY>` variables map into.
const SECTIONS: &[&str] = &["app", "backend", "realtime", "auth", "store"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/civica/civica.toml";
pub(crate) const LOCAL_CONFIG: &str = "civica.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("civica/civica.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/civica/civica.toml` (system-wide)
/// 3. `~/.config/civica/civica.toml` (user XDG config)
/// 4. `./civica.toml` (local directory)
/// 5. `CIVICA_*` environment variables
pub fn load_config() -> Result<CivicaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CivicaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CivicaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CivicaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CivicaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CivicaConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider mapping `CIVICA_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `CIVICA_REALTIME_RECONNECT_DELAY_MS` maps to `realtime.reconnect_delay_ms`.
fn env_provider() -> Env {
    Env::prefixed("CIVICA_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
