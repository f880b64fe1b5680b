// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence of chats, linked accounts, and tracked time.

use async_trait::async_trait;

use crate::error::TasktallyError;
use crate::types::{ChatId, LinkedAccount, TaskStats};

/// Relational persistence collaborator.
///
/// Implementations serialize their own writes; callers add no locking.
#[async_trait]
pub trait TaskLedger: Send + Sync {
    /// Maps an external task-tracker account to the chat it is linked to.
    async fn resolve_chat_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<ChatId>, TasktallyError>;

    /// Persists one completed task with its resolved duration.
    async fn store_completed_task(
        &self,
        chat_id: ChatId,
        task_title: &str,
        minutes: u32,
    ) -> Result<(), TasktallyError>;

    /// Records a chat. Returns `true` if the chat was not known before.
    async fn register_chat(
        &self,
        chat_id: ChatId,
        name: Option<&str>,
    ) -> Result<bool, TasktallyError>;

    /// Links an external account to a chat, replacing any earlier link for
    /// that account.
    async fn link_account(
        &self,
        chat_id: ChatId,
        account: &LinkedAccount,
    ) -> Result<(), TasktallyError>;

    /// Total and per-task tracked time for a chat.
    async fn stats(&self, chat_id: ChatId) -> Result<TaskStats, TasktallyError>;
}
