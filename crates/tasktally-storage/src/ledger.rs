// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`TaskLedger`].

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use tasktally_core::{
    AdapterType, ChatId, HealthStatus, LinkedAccount, PluginAdapter, TaskLedger, TaskStats,
    TasktallyError, TrackedTask,
};

use crate::database::{Database, map_tr_err, now_iso};

/// Chats, linked accounts, and tracked tasks in the shared database.
#[derive(Clone)]
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Inserts the chat row if it is missing. Returns `true` on insert.
fn ensure_chat(
    conn: &rusqlite::Connection,
    chat_id: i64,
    name: Option<&str>,
    now: &str,
) -> Result<bool, rusqlite::Error> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO chats (chat_id, name, created_at) VALUES (?1, ?2, ?3)",
        params![chat_id, name, now],
    )?;
    Ok(inserted == 1)
}

#[async_trait]
impl PluginAdapter for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite-ledger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, TasktallyError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TasktallyError> {
        self.db.close().await
    }
}

#[async_trait]
impl TaskLedger for SqliteLedger {
    async fn resolve_chat_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<ChatId>, TasktallyError> {
        let external_user_id = external_user_id.to_string();
        let chat = self
            .db
            .connection()
            .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
                conn.query_row(
                    "SELECT chat_id FROM accounts WHERE external_user_id = ?1",
                    params![external_user_id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;
        Ok(chat.map(ChatId))
    }

    async fn store_completed_task(
        &self,
        chat_id: ChatId,
        task_title: &str,
        minutes: u32,
    ) -> Result<(), TasktallyError> {
        let task = task_title.to_string();
        let now = now_iso();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                ensure_chat(&tx, chat_id.0, None, &now)?;
                tx.execute(
                    "INSERT INTO tracked_tasks (chat_id, task_title, minutes, tracked_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![chat_id.0, task, minutes, now],
                )?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;
        debug!(chat_id = %chat_id, minutes, "stored completed task");
        Ok(())
    }

    async fn register_chat(
        &self,
        chat_id: ChatId,
        name: Option<&str>,
    ) -> Result<bool, TasktallyError> {
        let name = name.map(str::to_string);
        let now = now_iso();
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction()?;
                let inserted = ensure_chat(&tx, chat_id.0, name.as_deref(), &now)?;
                if !inserted && name.is_some() {
                    tx.execute(
                        "UPDATE chats SET name = ?2 WHERE chat_id = ?1",
                        params![chat_id.0, name],
                    )?;
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn link_account(
        &self,
        chat_id: ChatId,
        account: &LinkedAccount,
    ) -> Result<(), TasktallyError> {
        let account = account.clone();
        let now = now_iso();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                ensure_chat(&tx, chat_id.0, None, &now)?;
                tx.execute(
                    "INSERT INTO accounts (external_user_id, chat_id, display_name, linked_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(external_user_id) DO UPDATE SET
                         chat_id = excluded.chat_id,
                         display_name = excluded.display_name,
                         linked_at = excluded.linked_at",
                    params![account.external_user_id, chat_id.0, account.display_name, now],
                )?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn stats(&self, chat_id: ChatId) -> Result<TaskStats, TasktallyError> {
        self.db
            .connection()
            .call(move |conn| -> Result<TaskStats, rusqlite::Error> {
                let total: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(minutes), 0) FROM tracked_tasks WHERE chat_id = ?1",
                    params![chat_id.0],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT task_title, minutes, tracked_at FROM tracked_tasks
                     WHERE chat_id = ?1 ORDER BY id DESC",
                )?;
                let tasks = stmt
                    .query_map(params![chat_id.0], |row| {
                        Ok(TrackedTask {
                            task: row.get(0)?,
                            minutes: row.get(1)?,
                            tracked_at: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TaskStats {
                    total_minutes: u64::try_from(total).unwrap_or_default(),
                    tasks,
                })
            })
            .await
            .map_err(map_tr_err)
    }
}
