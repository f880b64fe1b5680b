// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by adapters, the bus, and the relay.
//!
//! Everything that crosses a process boundary (bus payloads, key/value
//! entries) derives `Serialize`/`Deserialize` with explicit field names so
//! the JSON shape stays stable across releases.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Chat identity on the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a message within a chat, as assigned by the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    Bus,
    Provider,
}

/// Per-chat interaction mode governing how the next inbound message is read.
///
/// An absent entry in the session store means [`SessionState::NoAction`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    NoAction,
    AwaitingAuthorization,
    AwaitingTimeReply,
}

/// The normalized record published for every qualifying completion webhook.
///
/// `ask_time == true` implies `time_spent == 0`: the consumer must prompt the
/// user instead of trusting the minutes. Use [`NormalizedTrackingEvent::immediate`]
/// and [`NormalizedTrackingEvent::deferred`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTrackingEvent {
    /// External task-tracker account id.
    pub user_id: String,
    /// Task title.
    pub task: String,
    /// Minutes spent; 0 while deferred.
    #[serde(rename = "time_spent")]
    pub time_spent_minutes: u32,
    /// Whether the user must be asked for the duration.
    pub ask_time: bool,
}

impl NormalizedTrackingEvent {
    /// An event whose duration is already known.
    pub fn immediate(user_id: impl Into<String>, task: impl Into<String>, minutes: u32) -> Self {
        Self {
            user_id: user_id.into(),
            task: task.into(),
            time_spent_minutes: minutes,
            ask_time: false,
        }
    }

    /// An event whose duration must be asked for interactively.
    pub fn deferred(user_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            task: task.into(),
            time_spent_minutes: 0,
            ask_time: true,
        }
    }
}

/// Why an authorization attempt failed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthErrorKind {
    /// The user never completed the provider flow within the state TTL.
    Timeout,
    /// The provider rejected the code exchange or profile lookup.
    ProviderError,
    Unspecified,
}

/// Outcome of an authorization attempt, published on the auth topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthNotification {
    pub chat_id: ChatId,
    pub successful: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<AuthErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl AuthNotification {
    pub fn success(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            successful: true,
            error_kind: None,
            error_detail: None,
        }
    }

    pub fn failure(chat_id: ChatId, kind: AuthErrorKind, detail: Option<String>) -> Self {
        Self {
            chat_id,
            successful: false,
            error_kind: Some(kind),
            error_detail: detail,
        }
    }
}

/// An inbound message received from a chat adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat the message was posted in.
    pub chat_id: ChatId,
    /// Platform id of this message.
    pub message_id: MessageId,
    /// Sender display name or username, when the platform provides one.
    pub sender_name: Option<String>,
    /// Message text.
    pub text: String,
    /// Id of the message this one replies to.
    pub reply_to: Option<MessageId>,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

/// A plain-text message to deliver to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
}

impl OutboundMessage {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
        }
    }
}

/// One persisted task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTask {
    pub task: String,
    pub minutes: u32,
    /// ISO 8601 timestamp of when the record was stored.
    pub tracked_at: String,
}

/// Aggregated tracking statistics for one chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total_minutes: u64,
    /// Most recent first.
    pub tasks: Vec<TrackedTask>,
}

/// External account details returned by the authorization provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub external_user_id: String,
    pub display_name: Option<String>,
}
