// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tasktally configuration system.

use tasktally_config::diagnostic::ConfigError;
use tasktally_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with every section deserializes successfully.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "tally-test"
log_level = "debug"

[logging]
json = true

[telegram]
bot_token = "123:ABC"
allowed_users = ["alice", "42"]

[server]
host = "0.0.0.0"
port = 3000
max_body_bytes = 65536
public_base_url = "https://tally.example.com"
shutdown_grace_secs = 3

[oauth]
client_id = "cid"
client_secret = "secret"
scope = "data:read_write"
state_ttl_secs = 600

[storage]
database_path = "/tmp/tally.db"

[bus]
webhook_topic = "events"
auth_topic = "auth-events"
poll_interval_ms = 100
visibility_timeout_secs = 30
max_attempts = 3

[tracking]
completion_event = "item:completed"
ask_labels = ["@track"]
log_label_prefixes = ["@log"]
pending_reply_ttl_secs = 3600
status_ttl_secs = 7200
ignore_command = "/skip"
cancel_command = "/stop"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.agent.name, "tally-test");
    assert!(config.logging.json);
    assert_eq!(config.telegram.allowed_users, vec!["alice", "42"]);
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.public_base_url, "https://tally.example.com");
    assert_eq!(config.oauth.client_id.as_deref(), Some("cid"));
    assert_eq!(config.oauth.state_ttl_secs, 600);
    assert_eq!(config.bus.max_attempts, 3);
    assert_eq!(config.tracking.ask_labels, vec!["@track"]);
    assert_eq!(config.tracking.ignore_command, "/skip");
}

/// Unknown key produces an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[tracking]
ask_lables = ["track"]
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion, .. }
                if key == "tracking.ask_lables" && suggestion.as_deref() == Some("ask_labels")
        )
    });
    assert!(found, "expected ask_labels suggestion, got {errors:?}");
}

/// The unknown key is labelled where it appears in the inline source.
#[test]
fn unknown_key_is_labelled_in_source() {
    let toml = "[bus]\nwebhook_topik = \"x\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    let span = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { span, .. } => *span,
        _ => None,
    });
    let span = span.expect("span for unknown key");
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "webhook_topik");
}

/// Wrong value type is reported as InvalidType.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port")))
    );
}

/// Semantic errors surface after successful deserialization.
#[test]
fn validation_runs_after_deserialization() {
    let toml = r#"
[bus]
webhook_topic = "same"
auth_topic = "same"
"#;
    assert!(load_config_from_str(toml).is_ok());
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

/// Empty input yields the defaults.
#[test]
fn empty_toml_yields_defaults() {
    let config = load_and_validate_str("").unwrap();
    assert_eq!(config.bus.webhook_topic, "webhook");
    assert_eq!(config.tracking.status_ttl_secs, 86_400);
}
