// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound messages
//! and captured outbound messages for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use tasktally_core::{
    AdapterType, ChannelAdapter, ChatId, HealthStatus, InboundMessage, MessageId,
    OutboundMessage, PluginAdapter, TasktallyError,
};

/// A sent message together with the id the channel assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub text: String,
}

/// A mock messaging channel for testing.
///
/// - **inbound**: messages injected via `inject_message()` are returned by `receive()`
/// - **sent**: messages passed to `send()` are captured with monotonically
///   increasing ids starting at 1
pub struct MockChannel {
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
    inbound_notify: Arc<Notify>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    sent_notify: Arc<Notify>,
    next_id: AtomicI64,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

impl MockChannel {
    /// Create a new mock channel with empty queues.
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            inbound_notify: Arc::new(Notify::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            sent_notify: Arc::new(Notify::new()),
            next_id: AtomicI64::new(1),
            fail_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Inject an inbound message into the receive queue.
    pub async fn inject_message(&self, msg: InboundMessage) {
        self.inbound.lock().await.push_back(msg);
        self.inbound_notify.notify_one();
    }

    /// Makes `receive()` fail once the queue is empty, as a closed
    /// platform stream would.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.inbound_notify.notify_one();
    }

    /// When set, every `send()` fails with a channel error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// All messages sent so far.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Messages sent to one chat.
    pub async fn sent_to(&self, chat_id: ChatId) -> Vec<SentMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Waits until at least `count` messages were sent or `timeout` elapses,
    /// then returns everything sent.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<SentMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.sent_notify.notified();
            {
                let sent = self.sent.lock().await;
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.sent.lock().await.clone();
            }
        }
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TasktallyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TasktallyError> {
        self.close();
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), TasktallyError> {
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, TasktallyError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TasktallyError::Channel {
                message: "mock send failure".into(),
                source: None,
            });
        }
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().await.push(SentMessage {
            id,
            chat_id: msg.chat_id,
            text: msg.text,
        });
        self.sent_notify.notify_waiters();
        Ok(id)
    }

    async fn receive(&self) -> Result<InboundMessage, TasktallyError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(msg) = queue.pop_front() {
                    return Ok(msg);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(TasktallyError::Channel {
                    message: "mock inbound channel closed".into(),
                    source: None,
                });
            }
            self.inbound_notify.notified().await;
        }
    }
}

/// Builds a plain inbound text message.
pub fn inbound(chat_id: i64, message_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: ChatId(chat_id),
        message_id: MessageId(message_id),
        sender_name: Some("tester".to_string()),
        text: text.to_string(),
        reply_to: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Builds an inbound reply to `reply_to`.
pub fn reply(chat_id: i64, message_id: i64, reply_to: MessageId, text: &str) -> InboundMessage {
    InboundMessage {
        reply_to: Some(reply_to),
        ..inbound(chat_id, message_id, text)
    }
}
