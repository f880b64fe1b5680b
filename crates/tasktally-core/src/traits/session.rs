// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session state store: per-chat state plus single-use correlation records.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TasktallyError;
use crate::types::{ChatId, MessageId, NormalizedTrackingEvent, SessionState};

/// Shared key/value store of chat state and pending correlations.
///
/// Both `take_*` operations are atomic read-and-delete: of two concurrent
/// callers for the same key exactly one observes the value. Expired entries
/// are never returned.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current state of a chat. Absent or expired entries read as
    /// [`SessionState::NoAction`].
    async fn get_status(&self, chat_id: ChatId) -> Result<SessionState, TasktallyError>;

    /// Sets the state of a chat. Non-idle states carry the store's status TTL.
    async fn set_status(&self, chat_id: ChatId, state: SessionState)
    -> Result<(), TasktallyError>;

    /// Remembers which chat an authorization state token was issued for.
    async fn store_pending_auth(
        &self,
        token: &str,
        chat_id: ChatId,
        ttl: Duration,
    ) -> Result<(), TasktallyError>;

    /// Consumes an authorization state token.
    async fn take_pending_auth(&self, token: &str) -> Result<Option<ChatId>, TasktallyError>;

    /// Removes every pending authorization whose TTL has lapsed and returns
    /// the chats they were issued for.
    async fn expire_pending_auth(&self) -> Result<Vec<ChatId>, TasktallyError>;

    /// Remembers the event a prompt message is asking about.
    async fn store_pending_reply(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        event: &NormalizedTrackingEvent,
        ttl: Duration,
    ) -> Result<(), TasktallyError>;

    /// Consumes the event correlated with a prompt message.
    async fn take_pending_reply(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<NormalizedTrackingEvent>, TasktallyError>;

    /// Drops expired status and reply entries. Pending authorizations are
    /// left for [`SessionStore::expire_pending_auth`].
    async fn purge_expired(&self) -> Result<usize, TasktallyError>;
}
