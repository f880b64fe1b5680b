// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`SessionStore`](tasktally_core::SessionStore) backends.
//!
//! Both backends share one key layout. Every value is wrapped in the
//! versioned envelope from [`tasktally_bus::envelope`], so rows written by
//! an older build are rejected instead of misread.
//!
//! | key | envelope data |
//! |---|---|
//! | `status:{chat}` | `SessionState` in snake_case |
//! | `auth:{token}` | chat id |
//! | `reply:{chat}:{message}` | `NormalizedTrackingEvent` |

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use tasktally_bus::envelope;
use tasktally_core::{ChatId, MessageId, NormalizedTrackingEvent, SessionState, TasktallyError};

pub(crate) const AUTH_PREFIX: &str = "auth:";

pub(crate) fn status_key(chat_id: ChatId) -> String {
    format!("status:{chat_id}")
}

pub(crate) fn auth_key(token: &str) -> String {
    format!("{AUTH_PREFIX}{token}")
}

pub(crate) fn reply_key(chat_id: ChatId, message_id: MessageId) -> String {
    format!("reply:{chat_id}:{message_id}")
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, TasktallyError> {
    let bytes = envelope::encode(value)?;
    String::from_utf8(bytes).map_err(|e| TasktallyError::Decode {
        message: "envelope is not UTF-8".to_string(),
        source: Some(Box::new(e)),
    })
}

pub(crate) fn encode_state(state: SessionState) -> Result<String, TasktallyError> {
    encode(&state)
}

pub(crate) fn decode_state(value: &str) -> Result<SessionState, TasktallyError> {
    envelope::decode(value.as_bytes())
}

pub(crate) fn encode_chat(chat_id: ChatId) -> Result<String, TasktallyError> {
    encode(&chat_id)
}

pub(crate) fn decode_chat(value: &str) -> Result<ChatId, TasktallyError> {
    envelope::decode(value.as_bytes())
}

pub(crate) fn encode_event(event: &NormalizedTrackingEvent) -> Result<String, TasktallyError> {
    encode(event)
}

pub(crate) fn decode_event(value: &str) -> Result<NormalizedTrackingEvent, TasktallyError> {
    envelope::decode(value.as_bytes())
}
