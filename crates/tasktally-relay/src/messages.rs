// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing chat texts.

use tasktally_core::{AuthErrorKind, TaskStats};
use tasktally_tracker::format_minutes;

pub const AUTH_SUCCESS: &str =
    "Authorization completed successfully! Completed tasks will now be tracked.";
pub const AUTH_TIMEOUT: &str = "Authorization timed out. Send /auth to get a fresh link.";
pub const AUTH_PROVIDER_ERROR: &str =
    "The task tracker rejected the authorization. Please try /auth again later.";
pub const AUTH_FAILED: &str = "Authorization failed. Please try again with /auth.";

pub const IGNORED: &str = "OK, no tracking for this task";
pub const WELCOME: &str = "Welcome!";
pub const WELCOME_BACK: &str = "Welcome back!";
pub const NO_STATS: &str = "No tracked tasks yet.";
pub const TRANSIENT_FAILURE: &str = "Something went wrong on our side. Please try again later.";

const STATS_LIST_LIMIT: usize = 20;

/// Failure text for an unsuccessful authorization.
pub fn auth_failure(kind: Option<AuthErrorKind>) -> &'static str {
    match kind {
        Some(AuthErrorKind::Timeout) => AUTH_TIMEOUT,
        Some(AuthErrorKind::ProviderError) => AUTH_PROVIDER_ERROR,
        Some(AuthErrorKind::Unspecified) | None => AUTH_FAILED,
    }
}

pub fn stored(task: &str, minutes: u32) -> String {
    format!(
        "Stored {} for task: {task}",
        format_minutes(u64::from(minutes))
    )
}

pub fn store_failed(task: &str) -> String {
    format!("Could not store time for task: {task}. Service error, try again later")
}

pub fn time_prompt(task: &str, ignore_command: &str) -> String {
    format!(
        "How much time did you spend on \"{task}\"? Reply to this message with HHMM \
         (e.g. 0130), or reply {ignore_command} to skip."
    )
}

pub fn reply_stored(task: &str, minutes: u32) -> String {
    format!(
        "Stored {} ({minutes} min) for task: {task}",
        format_minutes(u64::from(minutes))
    )
}

pub fn reply_format_error(ignore_command: &str) -> String {
    format!(
        "Could not read that time. The format is HHMM, e.g. 0130 for 1h 30m. \
         This prompt is now closed: reply {ignore_command} to a fresh prompt to skip, \
         or wait for the next one."
    )
}

pub fn awaiting_authorization(cancel_command: &str) -> String {
    format!("Finish authorization using the link or send {cancel_command}")
}

pub fn awaiting_time_reply(ignore_command: &str) -> String {
    format!(
        "Please reply directly to the question about your task with the time spent \
         (HHMM), or reply {ignore_command} to it to skip."
    )
}

pub const AUTH_CANCELLED: &str = "Authorization cancelled.";

pub fn auth_link(base_url: &str, chat_id: i64) -> String {
    format!(
        "Open this link to connect your task tracker account:\n{}/auth?chat_id={chat_id}",
        base_url.trim_end_matches('/')
    )
}

pub fn help(ignore_command: &str, cancel_command: &str) -> String {
    format!(
        "Commands:\n\
         /start - register this chat\n\
         /auth - connect your task tracker account\n\
         /stats - show tracked time\n\
         /help - show this message\n\
         {cancel_command} - abort a pending authorization\n\
         {ignore_command} - reply to a time question to skip tracking"
    )
}

pub fn stats(stats: &TaskStats) -> String {
    if stats.tasks.is_empty() {
        return NO_STATS.to_string();
    }

    let mut out = format!("Total tracked: {}", format_minutes(stats.total_minutes));
    for task in stats.tasks.iter().take(STATS_LIST_LIMIT) {
        out.push_str(&format!(
            "\n- {}: {}",
            task.task,
            format_minutes(u64::from(task.minutes))
        ));
    }
    if stats.tasks.len() > STATS_LIST_LIMIT {
        out.push_str(&format!(
            "\n...and {} more",
            stats.tasks.len() - STATS_LIST_LIMIT
        ));
    }
    out
}
