// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process [`EventBus`] backed by unbounded tokio channels.
//!
//! Payloads published before anyone subscribes are buffered. Each topic has
//! at most one live subscription; dropping it hands the buffer back so a
//! later subscriber picks up where the previous one stopped. A nacked
//! payload is re-queued after the retry backoff. Nothing survives a restart.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tasktally_core::TasktallyError;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{Acknowledger, Delivery, EventBus, Subscription};

struct Message {
    payload: Vec<u8>,
    attempt: u32,
}

struct Topic {
    name: String,
    tx: mpsc::UnboundedSender<Message>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    dead_letters: Mutex<Vec<Vec<u8>>>,
}

impl Topic {
    fn new(name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.to_string(),
            tx,
            rx: Mutex::new(Some(rx)),
            dead_letters: Mutex::new(Vec::new()),
        }
    }

    fn send(&self, message: Message) -> Result<(), TasktallyError> {
        self.tx.send(message).map_err(|_| TasktallyError::Bus {
            message: format!("topic `{}` is closed", self.name),
            source: None,
        })
    }
}

/// In-memory bus for tests and single-process deployments.
pub struct MemoryBus {
    topics: DashMap<String, Arc<Topic>>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl MemoryBus {
    /// `max_attempts` bounds how often a nacked payload is delivered.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            topics: DashMap::new(),
            max_attempts: max_attempts.max(1),
            retry_backoff: Duration::ZERO,
        }
    }

    /// Delay before a nacked payload is queued again. Needs a tokio runtime
    /// when non-zero.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Topic::new(name)))
            .clone()
    }

    /// Payloads that exhausted their attempts on `topic`.
    pub fn dead_letters(&self, topic: &str) -> Vec<Vec<u8>> {
        self.topics
            .get(topic)
            .map(|t| t.dead_letters.lock().map(|d| d.clone()).unwrap_or_default())
            .unwrap_or_default()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TasktallyError> {
        self.topic(topic).send(Message {
            payload,
            attempt: 1,
        })
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, TasktallyError> {
        let topic = self.topic(topic);
        let rx = topic
            .rx
            .lock()
            .map_err(|_| TasktallyError::Internal("memory bus lock poisoned".into()))?
            .take()
            .ok_or_else(|| TasktallyError::Bus {
                message: format!("topic `{}` already has a subscriber", topic.name),
                source: None,
            })?;
        Ok(Box::new(MemorySubscription {
            topic,
            rx: Some(rx),
            max_attempts: self.max_attempts,
            retry_backoff: self.retry_backoff,
        }))
    }
}

struct MemorySubscription {
    topic: Arc<Topic>,
    rx: Option<mpsc::UnboundedReceiver<Message>>,
    max_attempts: u32,
    retry_backoff: Duration,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Result<Option<Delivery>, TasktallyError> {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(None);
        };
        Ok(rx.recv().await.map(|message| {
            Delivery::new(
                message.payload.clone(),
                message.attempt,
                Box::new(MemoryAcker {
                    topic: self.topic.clone(),
                    message,
                    max_attempts: self.max_attempts,
                    retry_backoff: self.retry_backoff,
                }),
            )
        }))
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if let (Some(rx), Ok(mut slot)) = (self.rx.take(), self.topic.rx.lock()) {
            *slot = Some(rx);
        }
    }
}

struct MemoryAcker {
    topic: Arc<Topic>,
    message: Message,
    max_attempts: u32,
    retry_backoff: Duration,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<(), TasktallyError> {
        Ok(())
    }

    async fn nack(self: Box<Self>) -> Result<(), TasktallyError> {
        let Message { payload, attempt } = self.message;
        if attempt >= self.max_attempts {
            warn!(
                topic = %self.topic.name,
                attempts = attempt,
                "delivery exhausted its attempts, dead-lettering"
            );
            if let Ok(mut dead) = self.topic.dead_letters.lock() {
                dead.push(payload);
            }
            return Ok(());
        }
        let retry = Message {
            payload,
            attempt: attempt + 1,
        };
        if self.retry_backoff.is_zero() {
            return self.topic.send(retry);
        }
        let topic = self.topic.clone();
        let backoff = self.retry_backoff;
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            if let Err(e) = topic.send(retry) {
                warn!(topic = %topic.name, error = %e, "dropping delayed redelivery");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish_json;
    use tasktally_core::{ChatId, NormalizedTrackingEvent};

    #[tokio::test]
    async fn publish_before_subscribe_is_buffered() {
        let bus = MemoryBus::default();
        bus.publish("webhook", b"one".to_vec()).await.unwrap();
        bus.publish("webhook", b"two".to_vec()).await.unwrap();

        let mut sub = bus.subscribe("webhook").await.unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.payload(), b"one");
        assert_eq!(first.attempt(), 1);
        first.ack().await.unwrap();
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.payload(), b"two");
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let bus = MemoryBus::default();
        bus.publish("auth", b"a".to_vec()).await.unwrap();
        bus.publish("webhook", b"w".to_vec()).await.unwrap();

        let mut auth = bus.subscribe("auth").await.unwrap();
        assert_eq!(auth.next().await.unwrap().unwrap().payload(), b"a");
        let mut webhook = bus.subscribe("webhook").await.unwrap();
        assert_eq!(webhook.next().await.unwrap().unwrap().payload(), b"w");
    }

    #[tokio::test]
    async fn nack_redelivers_until_dead_letter() {
        let bus = MemoryBus::new(2);
        bus.publish("webhook", b"poison".to_vec()).await.unwrap();
        let mut sub = bus.subscribe("webhook").await.unwrap();

        let d = sub.next().await.unwrap().unwrap();
        assert_eq!(d.attempt(), 1);
        d.nack().await.unwrap();

        let d = sub.next().await.unwrap().unwrap();
        assert_eq!(d.attempt(), 2);
        d.nack().await.unwrap();

        assert_eq!(bus.dead_letters("webhook"), vec![b"poison".to_vec()]);
        let pending = tokio::time::timeout(std::time::Duration::from_millis(50), sub.next()).await;
        assert!(pending.is_err(), "dead-lettered payload must not come back");
    }

    #[tokio::test(start_paused = true)]
    async fn nack_waits_out_retry_backoff() {
        let bus = MemoryBus::new(3).with_retry_backoff(Duration::from_secs(2));
        bus.publish("webhook", b"flaky".to_vec()).await.unwrap();
        let mut sub = bus.subscribe("webhook").await.unwrap();

        sub.next().await.unwrap().unwrap().nack().await.unwrap();
        let early = tokio::time::timeout(Duration::from_secs(1), sub.next()).await;
        assert!(early.is_err(), "redelivered before the backoff elapsed");

        let again = sub.next().await.unwrap().unwrap();
        assert_eq!(again.attempt(), 2);
        assert_eq!(again.payload(), b"flaky");
    }

    #[tokio::test]
    async fn second_subscriber_is_rejected_until_first_drops() {
        let bus = MemoryBus::default();
        let first = bus.subscribe("auth").await.unwrap();
        assert!(bus.subscribe("auth").await.is_err());
        drop(first);

        bus.publish("auth", b"later".to_vec()).await.unwrap();
        let mut second = bus.subscribe("auth").await.unwrap();
        assert_eq!(second.next().await.unwrap().unwrap().payload(), b"later");
    }

    #[tokio::test]
    async fn typed_round_trip_through_envelope() {
        let bus = MemoryBus::default();
        let event = NormalizedTrackingEvent::deferred("u-9", "Refactor");
        publish_json(&bus, "webhook", &event).await.unwrap();

        let mut sub = bus.subscribe("webhook").await.unwrap();
        let delivery = sub.next().await.unwrap().unwrap();
        let decoded: NormalizedTrackingEvent = delivery.decode().unwrap();
        assert_eq!(decoded, event);
        assert!(delivery.decode::<ChatId>().is_err());
    }
}
