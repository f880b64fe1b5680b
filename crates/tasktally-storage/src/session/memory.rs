// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local session store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use tasktally_core::{
    ChatId, MessageId, NormalizedTrackingEvent, SessionState, SessionStore, TasktallyError,
};

use super::{
    AUTH_PREFIX, auth_key, decode_chat, decode_event, decode_state, encode_chat, encode_event,
    encode_state, reply_key, status_key,
};

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory [`SessionStore`] keyed the same way as the SQLite backend.
///
/// Expiry follows tokio's clock, so tests can drive it with a paused runtime.
pub struct MemorySessionStore {
    entries: DashMap<String, Entry>,
    status_ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(status_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            status_ttl,
        }
    }

    fn put(&self, key: String, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }

    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    fn take(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .remove_if(key, |_, entry| entry.is_live(now))
            .map(|(_, entry)| entry.value)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_status(&self, chat_id: ChatId) -> Result<SessionState, TasktallyError> {
        self.get(&status_key(chat_id))
            .map_or(Ok(SessionState::NoAction), |value| decode_state(&value))
    }

    async fn set_status(
        &self,
        chat_id: ChatId,
        state: SessionState,
    ) -> Result<(), TasktallyError> {
        let key = status_key(chat_id);
        if state == SessionState::NoAction {
            self.entries.remove(&key);
        } else {
            self.put(key, encode_state(state)?, self.status_ttl);
        }
        Ok(())
    }

    async fn store_pending_auth(
        &self,
        token: &str,
        chat_id: ChatId,
        ttl: Duration,
    ) -> Result<(), TasktallyError> {
        self.put(auth_key(token), encode_chat(chat_id)?, ttl);
        Ok(())
    }

    async fn take_pending_auth(&self, token: &str) -> Result<Option<ChatId>, TasktallyError> {
        self.take(&auth_key(token))
            .map(|value| decode_chat(&value))
            .transpose()
    }

    async fn expire_pending_auth(&self) -> Result<Vec<ChatId>, TasktallyError> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(AUTH_PREFIX) && !entry.is_live(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut chats = Vec::with_capacity(expired.len());
        for key in expired {
            if let Some((_, entry)) = self.entries.remove_if(&key, |_, e| !e.is_live(now)) {
                chats.push(decode_chat(&entry.value)?);
            }
        }
        Ok(chats)
    }

    async fn store_pending_reply(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        event: &NormalizedTrackingEvent,
        ttl: Duration,
    ) -> Result<(), TasktallyError> {
        self.put(reply_key(chat_id, message_id), encode_event(event)?, ttl);
        Ok(())
    }

    async fn take_pending_reply(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<NormalizedTrackingEvent>, TasktallyError> {
        self.take(&reply_key(chat_id, message_id))
            .map(|value| decode_event(&value))
            .transpose()
    }

    async fn purge_expired(&self) -> Result<usize, TasktallyError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|key, entry| key.starts_with(AUTH_PREFIX) || entry.is_live(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn status_expires_on_tokio_clock() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        store
            .set_status(ChatId(1), SessionState::AwaitingTimeReply)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(
            store.get_status(ChatId(1)).await.unwrap(),
            SessionState::AwaitingTimeReply
        );
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            store.get_status(ChatId(1)).await.unwrap(),
            SessionState::NoAction
        );
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_reply_cannot_be_taken() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let event = NormalizedTrackingEvent::deferred("u", "Task");
        store
            .store_pending_reply(ChatId(1), MessageId(2), &event, Duration::from_secs(5))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(
            store
                .take_pending_reply(ChatId(1), MessageId(2))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn purge_leaves_auth_for_the_sweeper() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        store
            .store_pending_auth("t1", ChatId(4), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.expire_pending_auth().await.unwrap(), vec![ChatId(4)]);
        assert!(store.expire_pending_auth().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_takes_yield_one_winner() {
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        let event = NormalizedTrackingEvent::deferred("u", "Task");
        store
            .store_pending_reply(ChatId(1), MessageId(2), &event, Duration::from_secs(60))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .take_pending_reply(ChatId(1), MessageId(2))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
