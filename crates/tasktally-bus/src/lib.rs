// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic-based message bus with at-least-once delivery.
//!
//! Producers [`EventBus::publish`] opaque payloads to a named topic; one
//! consumer per topic pulls [`Delivery`] values from a [`Subscription`] and
//! must [`Delivery::ack`] or [`Delivery::nack`] each one. A nacked delivery
//! comes back until the implementation's attempt limit is reached. Consumers
//! must tolerate seeing the same payload more than once.

pub mod envelope;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tasktally_core::TasktallyError;

pub use memory::MemoryBus;

/// A publish/subscribe transport keyed by topic name.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Appends a payload to `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TasktallyError>;

    /// Opens the consumer side of `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, TasktallyError>;

    /// Drops settled deliveries that outlived their retention. Returns how
    /// many were removed. Transports that keep no history have nothing to do.
    async fn purge_settled(&self) -> Result<usize, TasktallyError> {
        Ok(0)
    }
}

/// The consumer side of one topic.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next delivery. `Ok(None)` means the topic is closed.
    ///
    /// Safe to drop mid-wait: a delivery claimed but never returned is
    /// redelivered by the implementation.
    async fn next(&mut self) -> Result<Option<Delivery>, TasktallyError>;
}

/// Settles a delivery with the implementation that produced it.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(self: Box<Self>) -> Result<(), TasktallyError>;
    async fn nack(self: Box<Self>) -> Result<(), TasktallyError>;
}

/// One payload handed to a consumer.
pub struct Delivery {
    payload: Vec<u8>,
    attempt: u32,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, attempt: u32, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            attempt,
            acker,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 1 for the first delivery, incremented on every redelivery.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Decodes the enveloped payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TasktallyError> {
        envelope::decode(&self.payload)
    }

    /// Marks the delivery as processed.
    pub async fn ack(self) -> Result<(), TasktallyError> {
        self.acker.ack().await
    }

    /// Hands the delivery back for redelivery.
    pub async fn nack(self) -> Result<(), TasktallyError> {
        self.acker.nack().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("bytes", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Publishes `value` wrapped in the versioned envelope.
pub async fn publish_json<T: Serialize + ?Sized + Sync>(
    bus: &dyn EventBus,
    topic: &str,
    value: &T,
) -> Result<(), TasktallyError> {
    let payload = envelope::encode(value)?;
    bus.publish(topic, payload).await
}
