// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`EventBus`] backed by the `queue` table.
//!
//! Topics map to queue names. Any number of subscriptions may poll the same
//! topic; the claim in [`queue::dequeue`] hands each entry to one of them.
//! A nacked entry is held back for `retry_backoff` before it is redelivered.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use tasktally_bus::{Acknowledger, Delivery, EventBus, Subscription};
use tasktally_config::model::BusConfig;
use tasktally_core::TasktallyError;

use crate::database::Database;
use crate::queue;

/// Durable bus. Unacknowledged deliveries survive a restart.
#[derive(Clone)]
pub struct SqliteBus {
    db: Database,
    poll_interval: Duration,
    visibility: Duration,
    max_attempts: u32,
    retry_backoff: Duration,
    completed_retention: Duration,
    failed_retention: Duration,
}

impl SqliteBus {
    pub fn new(
        db: Database,
        poll_interval: Duration,
        visibility: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            db,
            poll_interval,
            visibility,
            max_attempts: max_attempts.max(1),
            retry_backoff: Duration::ZERO,
            completed_retention: Duration::from_secs(86_400),
            failed_retention: Duration::from_secs(7 * 86_400),
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_retention(mut self, completed: Duration, failed: Duration) -> Self {
        self.completed_retention = completed;
        self.failed_retention = failed;
        self
    }

    pub fn from_config(db: Database, config: &BusConfig) -> Self {
        Self::new(
            db,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_secs(config.visibility_timeout_secs),
            config.max_attempts,
        )
        .with_retry_backoff(Duration::from_millis(config.retry_backoff_ms))
        .with_retention(
            Duration::from_secs(config.completed_retention_secs),
            Duration::from_secs(config.failed_retention_secs),
        )
    }
}

#[async_trait]
impl EventBus for SqliteBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TasktallyError> {
        let id = queue::enqueue(&self.db, topic, payload, self.max_attempts).await?;
        debug!(topic, id, "published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, TasktallyError> {
        Ok(Box::new(SqliteSubscription {
            bus: self.clone(),
            topic: topic.to_string(),
        }))
    }

    async fn purge_settled(&self) -> Result<usize, TasktallyError> {
        let removed =
            queue::purge_settled(&self.db, self.completed_retention, self.failed_retention)
                .await?;
        if removed > 0 {
            debug!(removed, "purged settled queue entries");
        }
        Ok(removed)
    }
}

struct SqliteSubscription {
    bus: SqliteBus,
    topic: String,
}

#[async_trait]
impl Subscription for SqliteSubscription {
    async fn next(&mut self) -> Result<Option<Delivery>, TasktallyError> {
        loop {
            if let Some(entry) =
                queue::dequeue(&self.bus.db, &self.topic, self.bus.visibility).await?
            {
                let acker = SqliteAcker {
                    db: self.bus.db.clone(),
                    topic: self.topic.clone(),
                    id: entry.id,
                    backoff: self.bus.retry_backoff,
                };
                return Ok(Some(Delivery::new(
                    entry.payload,
                    entry.attempts + 1,
                    Box::new(acker),
                )));
            }
            tokio::time::sleep(self.bus.poll_interval).await;
        }
    }
}

struct SqliteAcker {
    db: Database,
    topic: String,
    id: i64,
    backoff: Duration,
}

#[async_trait]
impl Acknowledger for SqliteAcker {
    async fn ack(self: Box<Self>) -> Result<(), TasktallyError> {
        queue::ack(&self.db, self.id).await
    }

    async fn nack(self: Box<Self>) -> Result<(), TasktallyError> {
        if !queue::fail(&self.db, self.id, self.backoff).await? {
            warn!(topic = %self.topic, id = self.id, "delivery exhausted its attempts, parked as failed");
        }
        Ok(())
    }
}
