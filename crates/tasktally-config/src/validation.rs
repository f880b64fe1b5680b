// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express, such as
//! valid hosts, non-zero TTLs, and distinct topic names.

use crate::diagnostic::ConfigError;
use crate::model::TasktallyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &TasktallyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.agent.log_level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "agent.log_level `{}` must be one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.server.max_body_bytes == 0 {
        fail("server.max_body_bytes must be positive".to_string());
    }

    let base = &config.server.public_base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        fail(format!(
            "server.public_base_url `{base}` must start with http:// or https://"
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    for (key, value) in [
        ("oauth.state_ttl_secs", config.oauth.state_ttl_secs),
        ("oauth.sweep_interval_secs", config.oauth.sweep_interval_secs),
        ("tracking.pending_reply_ttl_secs", config.tracking.pending_reply_ttl_secs),
        ("tracking.status_ttl_secs", config.tracking.status_ttl_secs),
        ("bus.poll_interval_ms", config.bus.poll_interval_ms),
        ("bus.visibility_timeout_secs", config.bus.visibility_timeout_secs),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    if config.bus.max_attempts == 0 {
        fail("bus.max_attempts must be at least 1".to_string());
    }

    let webhook_topic = config.bus.webhook_topic.trim();
    let auth_topic = config.bus.auth_topic.trim();
    if webhook_topic.is_empty() {
        fail("bus.webhook_topic must not be empty".to_string());
    }
    if auth_topic.is_empty() {
        fail("bus.auth_topic must not be empty".to_string());
    }
    if !webhook_topic.is_empty() && webhook_topic == auth_topic {
        fail(format!(
            "bus.webhook_topic and bus.auth_topic must differ, both are `{webhook_topic}`"
        ));
    }

    if config.tracking.completion_event.trim().is_empty() {
        fail("tracking.completion_event must not be empty".to_string());
    }

    for (i, label) in config.tracking.ask_labels.iter().enumerate() {
        if label.trim().is_empty() {
            fail(format!("tracking.ask_labels[{i}] must not be empty"));
        }
    }

    for (key, command) in [
        ("tracking.ignore_command", &config.tracking.ignore_command),
        ("tracking.cancel_command", &config.tracking.cancel_command),
    ] {
        if !command.starts_with('/') || command.len() < 2 {
            fail(format!("{key} `{command}` must be a slash command"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
