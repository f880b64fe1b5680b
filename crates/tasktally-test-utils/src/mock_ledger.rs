// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `TaskLedger` with failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tasktally_core::{ChatId, LinkedAccount, TaskLedger, TaskStats, TasktallyError, TrackedTask};

/// One `store_completed_task` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTask {
    pub chat_id: ChatId,
    pub task: String,
    pub minutes: u32,
}

#[derive(Default)]
struct Inner {
    chats: HashSet<ChatId>,
    accounts: HashMap<String, ChatId>,
    tasks: Vec<StoredTask>,
}

/// A mock ledger for testing.
#[derive(Default)]
pub struct MockLedger {
    inner: Mutex<Inner>,
    fail_stores: AtomicBool,
    fail_resolves: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps an external account to a chat, as a completed authorization would.
    pub async fn link(&self, external_user_id: &str, chat_id: ChatId) {
        let mut inner = self.inner.lock().await;
        inner.chats.insert(chat_id);
        inner.accounts.insert(external_user_id.to_string(), chat_id);
    }

    /// When set, `store_completed_task` fails.
    pub fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    /// When set, `resolve_chat_id` fails.
    pub fn fail_resolves(&self, fail: bool) {
        self.fail_resolves.store(fail, Ordering::SeqCst);
    }

    pub async fn stored(&self) -> Vec<StoredTask> {
        self.inner.lock().await.tasks.clone()
    }

    pub async fn linked_chat(&self, external_user_id: &str) -> Option<ChatId> {
        self.inner
            .lock()
            .await
            .accounts
            .get(external_user_id)
            .copied()
    }
}

fn injected(what: &str) -> TasktallyError {
    TasktallyError::Storage {
        source: format!("injected {what} failure").into(),
    }
}

#[async_trait]
impl TaskLedger for MockLedger {
    async fn resolve_chat_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<ChatId>, TasktallyError> {
        if self.fail_resolves.load(Ordering::SeqCst) {
            return Err(injected("resolve"));
        }
        Ok(self.linked_chat(external_user_id).await)
    }

    async fn store_completed_task(
        &self,
        chat_id: ChatId,
        task_title: &str,
        minutes: u32,
    ) -> Result<(), TasktallyError> {
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(injected("store"));
        }
        self.inner.lock().await.tasks.push(StoredTask {
            chat_id,
            task: task_title.to_string(),
            minutes,
        });
        Ok(())
    }

    async fn register_chat(
        &self,
        chat_id: ChatId,
        _name: Option<&str>,
    ) -> Result<bool, TasktallyError> {
        Ok(self.inner.lock().await.chats.insert(chat_id))
    }

    async fn link_account(
        &self,
        chat_id: ChatId,
        account: &LinkedAccount,
    ) -> Result<(), TasktallyError> {
        self.link(&account.external_user_id, chat_id).await;
        Ok(())
    }

    async fn stats(&self, chat_id: ChatId) -> Result<TaskStats, TasktallyError> {
        let inner = self.inner.lock().await;
        let tasks: Vec<TrackedTask> = inner
            .tasks
            .iter()
            .rev()
            .filter(|t| t.chat_id == chat_id)
            .map(|t| TrackedTask {
                task: t.task.clone(),
                minutes: t.minutes,
                tracked_at: String::new(),
            })
            .collect();
        Ok(TaskStats {
            total_minutes: tasks.iter().map(|t| u64::from(t.minutes)).sum(),
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn link_then_resolve() {
        let ledger = MockLedger::new();
        assert_eq!(ledger.resolve_chat_id("u1").await.unwrap(), None);
        ledger.link("u1", ChatId(42)).await;
        assert_eq!(ledger.resolve_chat_id("u1").await.unwrap(), Some(ChatId(42)));
        assert!(!ledger.register_chat(ChatId(42), None).await.unwrap());
    }

    #[tokio::test]
    async fn stats_are_most_recent_first() {
        let ledger = MockLedger::new();
        ledger
            .store_completed_task(ChatId(1), "a", 30)
            .await
            .unwrap();
        ledger
            .store_completed_task(ChatId(1), "b", 45)
            .await
            .unwrap();
        ledger
            .store_completed_task(ChatId(2), "c", 10)
            .await
            .unwrap();

        let stats = ledger.stats(ChatId(1)).await.unwrap();
        assert_eq!(stats.total_minutes, 75);
        assert_eq!(stats.tasks[0].task, "b");
        assert_eq!(stats.tasks.len(), 2);
    }

    #[tokio::test]
    async fn injected_failures() {
        let ledger = MockLedger::new();
        ledger.fail_stores(true);
        ledger.fail_resolves(true);
        assert!(ledger.store_completed_task(ChatId(1), "a", 1).await.is_err());
        assert!(ledger.resolve_chat_id("u1").await.is_err());
        assert!(ledger.stored().await.is_empty());
    }
}
