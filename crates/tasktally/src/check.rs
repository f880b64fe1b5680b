// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tasktally check-config`: the effective settings with secrets masked.

use std::fmt::Write;

use tasktally_config::TasktallyConfig;

fn secret(value: Option<&String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "<set>",
        _ => "<unset>",
    }
}

fn list(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}

pub fn render_settings(config: &TasktallyConfig) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = render_into(&mut out, config);
    out
}

fn render_into(out: &mut String, c: &TasktallyConfig) -> std::fmt::Result {
    writeln!(out, "configuration OK")?;
    writeln!(out, "[agent] name={} log_level={}", c.agent.name, c.agent.log_level)?;
    writeln!(out, "[logging] json={}", c.logging.json)?;
    writeln!(
        out,
        "[telegram] bot_token={} allowed_users={}",
        secret(c.telegram.bot_token.as_ref()),
        if c.telegram.allowed_users.is_empty() {
            "(everyone)".to_string()
        } else {
            list(&c.telegram.allowed_users)
        }
    )?;
    writeln!(
        out,
        "[server] listen={}:{} max_body_bytes={} public_base_url={} shutdown_grace_secs={}",
        c.server.host,
        c.server.port,
        c.server.max_body_bytes,
        c.server.public_base_url,
        c.server.shutdown_grace_secs
    )?;
    writeln!(
        out,
        "[oauth] client_id={} client_secret={} authorize_url={} token_url={} sync_url={} scope={} state_ttl_secs={} sweep_interval_secs={}",
        c.oauth.client_id.as_deref().unwrap_or("<unset>"),
        secret(c.oauth.client_secret.as_ref()),
        c.oauth.authorize_url,
        c.oauth.token_url,
        c.oauth.sync_url,
        c.oauth.scope,
        c.oauth.state_ttl_secs,
        c.oauth.sweep_interval_secs
    )?;
    writeln!(out, "[storage] database_path={}", c.storage.database_path)?;
    writeln!(
        out,
        "[bus] webhook_topic={} auth_topic={} poll_interval_ms={} visibility_timeout_secs={} max_attempts={} retry_backoff_ms={} completed_retention_secs={} failed_retention_secs={}",
        c.bus.webhook_topic,
        c.bus.auth_topic,
        c.bus.poll_interval_ms,
        c.bus.visibility_timeout_secs,
        c.bus.max_attempts,
        c.bus.retry_backoff_ms,
        c.bus.completed_retention_secs,
        c.bus.failed_retention_secs
    )?;
    writeln!(
        out,
        "[tracking] completion_event={} ask_labels={} log_label_prefixes={} pending_reply_ttl_secs={} status_ttl_secs={} ignore_command={} cancel_command={}",
        c.tracking.completion_event,
        list(&c.tracking.ask_labels),
        list(&c.tracking.log_label_prefixes),
        c.tracking.pending_reply_ttl_secs,
        c.tracking.status_ttl_secs,
        c.tracking.ignore_command,
        c.tracking.cancel_command
    )
}
