// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Civica configuration system.

use std::path::Path;

use civica_config::diagnostic::ConfigError;
use civica_config::model::CivicaConfig;
use civica_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_civica_config() {
    let toml = r#"
[app]
log_level = "debug"

[backend]
base_url = "https://municipio.example/api"
timeout_secs = 10
max_retries = 2
retry_delay_ms = 250

[realtime]
url = "wss://municipio.example/ws"
reconnect_attempts = 3
reconnect_delay_ms = 500

[auth]
token = "bearer-123"

[store]
page_size = 25
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.backend.base_url, "https://municipio.example/api");
    assert_eq!(config.backend.timeout_secs, 10);
    assert_eq!(config.backend.max_retries, 2);
    assert_eq!(config.backend.retry_delay_ms, 250);
    assert_eq!(config.realtime.url, "wss://municipio.example/ws");
    assert_eq!(config.realtime.reconnect_attempts, 3);
    assert_eq!(config.realtime.reconnect_delay_ms, 500);
    assert_eq!(config.auth.token.as_deref(), Some("bearer-123"));
    assert_eq!(config.store.page_size, 25);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.app.log_level, "info");
    assert_eq!(config.backend.base_url, "http://localhost:3000/api");
    assert_eq!(config.backend.timeout_secs, 30);
    assert_eq!(config.backend.max_retries, 1);
    assert_eq!(config.realtime.url, "ws://localhost:3000/ws");
    assert_eq!(config.realtime.reconnect_attempts, 5);
    assert_eq!(config.realtime.reconnect_delay_ms, 1000);
    assert!(config.auth.token.is_none());
    assert_eq!(config.store.page_size, 10);
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let toml = r#"
[realtime]
reconect_attempts = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("typo should be rejected");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { key, suggestion, .. } if key == "reconect_attempts" => {
            suggestion.clone()
        }
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("reconnect_attempts"));
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[whatsapp]
enabled = true
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn wrong_type_is_reported_with_its_key() {
    let toml = r#"
[store]
page_size = "twenty"
"#;
    let errors = load_and_validate_str(toml).expect_err("string is not a page size");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { key, .. } if key == "store.page_size"
    )));
}

#[test]
fn validation_runs_after_parsing() {
    let toml = r#"
[store]
page_size = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("page size 0 is invalid");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("page_size"))));
}

#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "civica.toml",
            r#"
[realtime]
url = "ws://from-file/ws"

[store]
page_size = 20
"#,
        )?;
        jail.set_env("CIVICA_AUTH_TOKEN", "from-env");
        jail.set_env("CIVICA_REALTIME_RECONNECT_DELAY_MS", "250");

        let config: CivicaConfig =
            load_and_validate_path(Path::new("civica.toml")).expect("config should load");
        assert_eq!(config.auth.token.as_deref(), Some("from-env"));
        assert_eq!(config.realtime.reconnect_delay_ms, 250);
        assert_eq!(config.realtime.url, "ws://from-file/ws");
        assert_eq!(config.store.page_size, 20);
        Ok(())
    });
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let config = load_and_validate_path(Path::new("/nonexistent/civica.toml"))
        .expect("missing file should be skipped");
    assert_eq!(config.store.page_size, 10);
}
