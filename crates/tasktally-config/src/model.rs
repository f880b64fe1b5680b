// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Tasktally.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Tasktally configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TasktallyConfig {
    /// Process identity and log level.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Log output format.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telegram bot integration settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// HTTP server for webhooks and authorization.
    #[serde(default)]
    pub server: ServerConfig,

    /// Delegated authorization against the task tracker.
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message bus topics and delivery settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Classification tokens, command literals, and correlation TTLs.
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs and the health endpoint.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "tasktally".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Emit newline-delimited JSON instead of human-readable lines.
    #[serde(default)]
    pub json: bool,
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. Required by `serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Telegram user IDs or usernames allowed to talk to the bot.
    /// Empty means everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Externally reachable base URL, used to build authorization links
    /// and the provider redirect URI.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Seconds in-flight background tasks get to finish on shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            public_base_url: default_public_base_url(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

/// Delegated authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthConfig {
    /// OAuth client id issued by the task tracker.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret issued by the task tracker.
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Endpoint returning the authorized user's profile.
    #[serde(default = "default_sync_url")]
    pub sync_url: String,

    #[serde(default = "default_scope")]
    pub scope: String,

    /// How long an issued state token stays valid.
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,

    /// How often lapsed state tokens are swept into timeout notifications.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            sync_url: default_sync_url(),
            scope: default_scope(),
            state_ttl_secs: default_state_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_authorize_url() -> String {
    "https://todoist.com/oauth/authorize".to_string()
}

fn default_token_url() -> String {
    "https://todoist.com/oauth/access_token".to_string()
}

fn default_sync_url() -> String {
    "https://api.todoist.com/api/v1/sync".to_string()
}

fn default_scope() -> String {
    "data:read".to_string()
}

fn default_state_ttl_secs() -> u64 {
    900
}

fn default_sweep_interval_secs() -> u64 {
    30
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tasktally").join("tasktally.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tasktally.db"))
        .to_string_lossy()
        .into_owned()
}

/// Message bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Topic carrying normalized tracking events.
    #[serde(default = "default_webhook_topic")]
    pub webhook_topic: String,

    /// Topic carrying authorization outcomes.
    #[serde(default = "default_auth_topic")]
    pub auth_topic: String,

    /// Idle delay between polls of an empty topic.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Seconds a delivery may stay unacknowledged before it is redelivered.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Deliveries after which an entry is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before a nacked delivery becomes eligible again.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How long acknowledged entries are kept before the sweeper deletes them.
    #[serde(default = "default_completed_retention_secs")]
    pub completed_retention_secs: u64,

    /// How long dead-lettered entries are kept for inspection.
    #[serde(default = "default_failed_retention_secs")]
    pub failed_retention_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            webhook_topic: default_webhook_topic(),
            auth_topic: default_auth_topic(),
            poll_interval_ms: default_poll_interval_ms(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            completed_retention_secs: default_completed_retention_secs(),
            failed_retention_secs: default_failed_retention_secs(),
        }
    }
}

fn default_webhook_topic() -> String {
    "webhook".to_string()
}

fn default_auth_topic() -> String {
    "auth".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_visibility_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    2_000
}

fn default_completed_retention_secs() -> u64 {
    86_400
}

fn default_failed_retention_secs() -> u64 {
    7 * 86_400
}

/// Classification literals, chat command literals, and correlation TTLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Webhook event name that marks a completed task.
    #[serde(default = "default_completion_event")]
    pub completion_event: String,

    /// Labels that ask the user for the duration interactively.
    #[serde(default = "default_ask_labels")]
    pub ask_labels: Vec<String>,

    /// Prefixes of duration labels such as `log0130`.
    #[serde(default = "default_log_label_prefixes")]
    pub log_label_prefixes: Vec<String>,

    /// How long a time prompt can still be answered.
    #[serde(default = "default_pending_reply_ttl_secs")]
    pub pending_reply_ttl_secs: u64,

    /// Safety-net expiry for non-idle chat states.
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,

    /// Reply text that skips tracking for a prompted task.
    #[serde(default = "default_ignore_command")]
    pub ignore_command: String,

    /// Text that abandons a pending authorization.
    #[serde(default = "default_cancel_command")]
    pub cancel_command: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            completion_event: default_completion_event(),
            ask_labels: default_ask_labels(),
            log_label_prefixes: default_log_label_prefixes(),
            pending_reply_ttl_secs: default_pending_reply_ttl_secs(),
            status_ttl_secs: default_status_ttl_secs(),
            ignore_command: default_ignore_command(),
            cancel_command: default_cancel_command(),
        }
    }
}

fn default_completion_event() -> String {
    "item:completed".to_string()
}

fn default_ask_labels() -> Vec<String> {
    vec!["track".to_string(), "@track".to_string()]
}

fn default_log_label_prefixes() -> Vec<String> {
    vec!["log".to_string(), "@log".to_string()]
}

fn default_pending_reply_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_status_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_ignore_command() -> String {
    "/ignore_task".to_string()
}

fn default_cancel_command() -> String {
    "/cancel".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TasktallyConfig::default();
        assert_eq!(config.agent.name, "tasktally");
        assert_eq!(config.server.max_body_bytes, 1_048_576);
        assert_eq!(config.oauth.state_ttl_secs, 900);
        assert_eq!(config.bus.webhook_topic, "webhook");
        assert_eq!(config.bus.auth_topic, "auth");
        assert_eq!(config.bus.retry_backoff_ms, 2_000);
        assert!(config.bus.failed_retention_secs > config.bus.completed_retention_secs);
        assert_eq!(config.tracking.completion_event, "item:completed");
        assert_eq!(config.tracking.ask_labels, vec!["track", "@track"]);
        assert_eq!(config.tracking.log_label_prefixes, vec!["log", "@log"]);
        assert_eq!(config.tracking.ignore_command, "/ignore_task");
        assert!(config.storage.database_path.ends_with("tasktally.db"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: TasktallyConfig = toml::from_str(
            r#"
[tracking]
ask_labels = ["@ask"]
"#,
        )
        .unwrap();
        assert_eq!(config.tracking.ask_labels, vec!["@ask"]);
        assert_eq!(config.tracking.cancel_command, "/cancel");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = toml::from_str::<TasktallyConfig>(
            r#"
[bus]
webhook_topik = "x"
"#,
        );
        assert!(result.is_err());
    }
}
