// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session store persisted in the `kv_entries` table.

use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use tasktally_core::{
    ChatId, MessageId, NormalizedTrackingEvent, SessionState, SessionStore, TasktallyError,
};

use super::{
    AUTH_PREFIX, auth_key, decode_chat, decode_event, decode_state, encode_chat, encode_event,
    encode_state, reply_key, status_key,
};
use crate::database::{Database, map_tr_err, now_millis};

/// Durable session store. Survives restarts; expiry is evaluated on read.
#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Database,
    status_ttl: Duration,
}

impl SqliteSessionStore {
    pub fn new(db: Database, status_ttl: Duration) -> Self {
        Self { db, status_ttl }
    }

    async fn put(&self, key: String, value: String, ttl: Duration) -> Result<(), TasktallyError> {
        let expires_at = now_millis().saturating_add(ttl_millis(ttl));
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         expires_at = excluded.expires_at",
                    params![key, value, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn get(&self, key: String) -> Result<Option<String>, TasktallyError> {
        let now = now_millis();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT value FROM kv_entries
                     WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                    params![key, now],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Atomic read-and-delete of a live entry.
    async fn take(&self, key: String) -> Result<Option<String>, TasktallyError> {
        let now = now_millis();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "DELETE FROM kv_entries
                     WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
                     RETURNING value",
                    params![key, now],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete(&self, key: String) -> Result<(), TasktallyError> {
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get_status(&self, chat_id: ChatId) -> Result<SessionState, TasktallyError> {
        match self.get(status_key(chat_id)).await? {
            Some(value) => decode_state(&value),
            None => Ok(SessionState::NoAction),
        }
    }

    async fn set_status(
        &self,
        chat_id: ChatId,
        state: SessionState,
    ) -> Result<(), TasktallyError> {
        if state == SessionState::NoAction {
            return self.delete(status_key(chat_id)).await;
        }
        self.put(status_key(chat_id), encode_state(state)?, self.status_ttl)
            .await
    }

    async fn store_pending_auth(
        &self,
        token: &str,
        chat_id: ChatId,
        ttl: Duration,
    ) -> Result<(), TasktallyError> {
        self.put(auth_key(token), encode_chat(chat_id)?, ttl).await
    }

    async fn take_pending_auth(&self, token: &str) -> Result<Option<ChatId>, TasktallyError> {
        self.take(auth_key(token))
            .await?
            .map(|value| decode_chat(&value))
            .transpose()
    }

    async fn expire_pending_auth(&self) -> Result<Vec<ChatId>, TasktallyError> {
        let now = now_millis();
        let pattern = format!("{AUTH_PREFIX}%");
        let values = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "DELETE FROM kv_entries
                     WHERE key LIKE ?1 AND expires_at IS NOT NULL AND expires_at <= ?2
                     RETURNING value",
                )?;
                let rows = stmt.query_map(params![pattern, now], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)?;
        values.iter().map(|v| decode_chat(v)).collect()
    }

    async fn store_pending_reply(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        event: &NormalizedTrackingEvent,
        ttl: Duration,
    ) -> Result<(), TasktallyError> {
        let value = encode_event(event)?;
        self.put(reply_key(chat_id, message_id), value, ttl).await
    }

    async fn take_pending_reply(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<NormalizedTrackingEvent>, TasktallyError> {
        self.take(reply_key(chat_id, message_id))
            .await?
            .map(|value| decode_event(&value))
            .transpose()
    }

    async fn purge_expired(&self) -> Result<usize, TasktallyError> {
        let now = now_millis();
        let pattern = format!("{AUTH_PREFIX}%");
        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "DELETE FROM kv_entries
                     WHERE key NOT LIKE ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
                    params![pattern, now],
                )
            })
            .await
            .map_err(map_tr_err)?;
        if removed > 0 {
            debug!(removed, "purged expired session entries");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup(status_ttl: Duration) -> (SqliteSessionStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (SqliteSessionStore::new(db, status_ttl), dir)
    }

    #[tokio::test]
    async fn absent_status_reads_as_no_action() {
        let (store, _dir) = setup(Duration::from_secs(60)).await;
        assert_eq!(
            store.get_status(ChatId(1)).await.unwrap(),
            SessionState::NoAction
        );
    }

    #[tokio::test]
    async fn status_round_trip_and_reset() {
        let (store, _dir) = setup(Duration::from_secs(60)).await;
        store
            .set_status(ChatId(1), SessionState::AwaitingTimeReply)
            .await
            .unwrap();
        assert_eq!(
            store.get_status(ChatId(1)).await.unwrap(),
            SessionState::AwaitingTimeReply
        );
        store
            .set_status(ChatId(1), SessionState::NoAction)
            .await
            .unwrap();
        assert_eq!(
            store.get_status(ChatId(1)).await.unwrap(),
            SessionState::NoAction
        );
    }

    #[tokio::test]
    async fn status_expires_after_ttl() {
        let (store, _dir) = setup(Duration::from_millis(50)).await;
        store
            .set_status(ChatId(1), SessionState::AwaitingAuthorization)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(
            store.get_status(ChatId(1)).await.unwrap(),
            SessionState::NoAction
        );
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pending_reply_is_single_use() {
        let (store, _dir) = setup(Duration::from_secs(60)).await;
        let event = NormalizedTrackingEvent::deferred("u-1", "Write docs");
        store
            .store_pending_reply(ChatId(1), MessageId(10), &event, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store
                .take_pending_reply(ChatId(2), MessageId(10))
                .await
                .unwrap(),
            None,
            "another chat's message with the same id must not match"
        );
        assert_eq!(
            store
                .take_pending_reply(ChatId(1), MessageId(10))
                .await
                .unwrap(),
            Some(event)
        );
        assert_eq!(
            store
                .take_pending_reply(ChatId(1), MessageId(10))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn concurrent_takes_yield_one_winner() {
        let (store, _dir) = setup(Duration::from_secs(60)).await;
        store
            .store_pending_auth("tok", ChatId(5), Duration::from_secs(60))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.take_pending_auth("tok").await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if let Some(chat) = handle.await.unwrap() {
                assert_eq!(chat, ChatId(5));
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn expired_auth_is_not_taken_but_is_reported() {
        let (store, _dir) = setup(Duration::from_secs(60)).await;
        store
            .store_pending_auth("old", ChatId(8), Duration::from_millis(30))
            .await
            .unwrap();
        store
            .store_pending_auth("fresh", ChatId(9), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.take_pending_auth("old").await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.expire_pending_auth().await.unwrap(), vec![ChatId(8)]);
        assert!(store.expire_pending_auth().await.unwrap().is_empty());
        assert_eq!(
            store.take_pending_auth("fresh").await.unwrap(),
            Some(ChatId(9))
        );
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("durable.db");
        let path = path.to_str().unwrap();
        {
            let store = SqliteSessionStore::new(
                Database::open(path).await.unwrap(),
                Duration::from_secs(60),
            );
            store
                .set_status(ChatId(3), SessionState::AwaitingTimeReply)
                .await
                .unwrap();
        }
        let store =
            SqliteSessionStore::new(Database::open(path).await.unwrap(), Duration::from_secs(60));
        assert_eq!(
            store.get_status(ChatId(3)).await.unwrap(),
            SessionState::AwaitingTimeReply
        );
    }

    #[tokio::test]
    async fn stored_rows_are_versioned() {
        let (store, _dir) = setup(Duration::from_secs(60)).await;
        let event = NormalizedTrackingEvent::deferred("u", "T");
        store
            .store_pending_reply(ChatId(1), MessageId(2), &event, Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_status(ChatId(1), SessionState::AwaitingTimeReply)
            .await
            .unwrap();

        let rows: Vec<(String, String)> = store
            .db
            .connection()
            .call(|conn| -> Result<Vec<(String, String)>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT key, value FROM kv_entries ORDER BY key")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        for (key, value) in &rows {
            assert!(value.starts_with(r#"{"v":1,"data":"#), "{key} = {value}");
        }
    }

    #[tokio::test]
    async fn unknown_version_is_a_decode_error() {
        let (store, _dir) = setup(Duration::from_secs(60)).await;
        store
            .put(
                reply_key(ChatId(1), MessageId(2)),
                r#"{"v":9,"data":{"user_id":"u","task":"T","time_spent":0,"ask_time":true}}"#
                    .to_string(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let err = store
            .take_pending_reply(ChatId(1), MessageId(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TasktallyError::Decode { .. }));
        assert!(err.to_string().contains("unsupported envelope version 9"));
    }
}
