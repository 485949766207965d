// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::CivicaConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const MAX_PAGE_SIZE: u32 = 100;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &CivicaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.app.log_level.as_str()) {
        fail(format!(
            "app.log_level `{}` must be one of {}",
            config.app.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if !has_scheme(&config.backend.base_url, &["http://", "https://"]) {
        fail(format!(
            "backend.base_url `{}` must start with http:// or https://",
            config.backend.base_url
        ));
    }

    if config.backend.timeout_secs == 0 {
        fail("backend.timeout_secs must be greater than 0".to_string());
    }

    if !has_scheme(&config.realtime.url, &["ws://", "wss://"]) {
        fail(format!(
            "realtime.url `{}` must start with ws:// or wss://",
            config.realtime.url
        ));
    }

    if config.realtime.reconnect_attempts == 0 {
        fail("realtime.reconnect_attempts must be at least 1".to_string());
    }

    if let Some(token) = &config.auth.token
        && token.trim().is_empty()
    {
        fail("auth.token must not be blank; remove it to run unauthenticated".to_string());
    }

    if config.store.page_size == 0 || config.store.page_size > MAX_PAGE_SIZE {
        fail(format!(
            "store.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
            config.store.page_size
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    let url = url.trim();
    schemes
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}
