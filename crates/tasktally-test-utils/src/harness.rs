// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` wires the webhook router, an in-memory bus and session
//! store, the relay loops and the command router around a [`MockChannel`]
//! and a [`MockLedger`]. Requests go through the real axum router via
//! `oneshot`; bus traffic flows through the real relay loops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

use tasktally_bus::{EventBus, MemoryBus, publish_json};
use tasktally_config::model::TasktallyConfig;
use tasktally_core::{AuthNotification, InboundMessage, SessionStore, TasktallyError};
use tasktally_relay::{CommandRouter, NotificationRelay, RelaySettings, RouterSettings};
use tasktally_storage::MemorySessionStore;
use tasktally_tracker::{ClassifierConfig, EventClassifier};
use tasktally_webhook::{AuthSettings, HealthState, Topics, WebhookState, router};

use crate::mock_channel::{MockChannel, SentMessage};
use crate::mock_ledger::MockLedger;
use crate::mock_provider::MockAuthProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: TasktallyConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = TasktallyConfig::default();
        config.oauth.client_id = Some("test-client".to_string());
        config.server.public_base_url = "https://tally.test".to_string();
        Self { config }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: TasktallyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TestHarness {
        let config = self.config;
        let channel = Arc::new(MockChannel::new());
        let ledger = Arc::new(MockLedger::new());
        let provider = Arc::new(MockAuthProvider::new());
        let bus = Arc::new(MemoryBus::new(config.bus.max_attempts));
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
            config.tracking.status_ttl_secs,
        )));

        let classifier = EventClassifier::new(ClassifierConfig {
            completion_event: config.tracking.completion_event.clone(),
            ask_labels: config.tracking.ask_labels.clone(),
            log_label_prefixes: config.tracking.log_label_prefixes.clone(),
        });

        let webhook_state = WebhookState {
            classifier: Arc::new(classifier),
            bus: bus.clone(),
            sessions: sessions.clone(),
            ledger: ledger.clone(),
            provider: provider.clone(),
            auth: AuthSettings::from_config(&config.oauth),
            topics: Topics {
                webhook: config.bus.webhook_topic.clone(),
                auth: config.bus.auth_topic.clone(),
            },
            tasks: TaskTracker::new(),
            health: HealthState {
                start_time: Instant::now(),
            },
        };

        let relay = NotificationRelay::new(
            channel.clone(),
            sessions.clone(),
            ledger.clone(),
            RelaySettings::from_config(&config.tracking),
        );
        let command_router = CommandRouter::new(
            channel.clone(),
            sessions.clone(),
            ledger.clone(),
            RouterSettings::from_config(&config.tracking, &config.server),
        );

        TestHarness {
            channel,
            ledger,
            provider,
            bus,
            sessions,
            relay,
            router: command_router,
            config,
            webhook_state,
            cancel: CancellationToken::new(),
            loops: TaskTracker::new(),
        }
    }
}

/// A complete test environment with mock adapters and in-memory state.
pub struct TestHarness {
    pub channel: Arc<MockChannel>,
    pub ledger: Arc<MockLedger>,
    pub provider: Arc<MockAuthProvider>,
    pub bus: Arc<MemoryBus>,
    pub sessions: Arc<MemorySessionStore>,
    pub relay: NotificationRelay,
    pub router: CommandRouter,
    pub config: TasktallyConfig,
    webhook_state: WebhookState,
    cancel: CancellationToken,
    loops: TaskTracker,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The axum application under test.
    pub fn app(&self) -> Router {
        router(self.webhook_state.clone(), self.config.server.max_body_bytes)
    }

    /// Subscribes to both topics and spawns the two relay loops.
    pub async fn start_relay(&self) -> Result<(), TasktallyError> {
        let auth_sub = self.bus.subscribe(&self.config.bus.auth_topic).await?;
        let webhook_sub = self.bus.subscribe(&self.config.bus.webhook_topic).await?;

        let relay = self.relay.clone();
        let cancel = self.cancel.clone();
        self.loops
            .spawn(async move { relay.run_auth_loop(auth_sub, cancel).await });

        let relay = self.relay.clone();
        let cancel = self.cancel.clone();
        self.loops
            .spawn(async move { relay.run_webhook_loop(webhook_sub, cancel).await });
        Ok(())
    }

    /// Spawns the command router reading from the mock channel.
    pub fn start_router(&self) {
        let command_router = self.router.clone();
        let cancel = self.cancel.clone();
        self.loops
            .spawn(async move { command_router.run(cancel).await });
    }

    /// POSTs `body` to `/webhook` and returns the status.
    pub async fn post_webhook(&self, body: serde_json::Value) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()));
        let Ok(request) = request else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match self.app().oneshot(request).await {
            Ok(response) => response.status(),
            Err(never) => match never {},
        }
    }

    /// Publishes an authorization outcome as the callback endpoint would.
    pub async fn publish_auth(&self, notification: &AuthNotification) -> Result<(), TasktallyError> {
        publish_json(
            self.bus.as_ref(),
            &self.config.bus.auth_topic,
            notification,
        )
        .await
    }

    /// Routes one chat message synchronously and sends the answer.
    pub async fn chat(&self, msg: InboundMessage) {
        self.router.handle(msg).await;
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// Waits for at least `count` outbound messages.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<SentMessage> {
        self.channel
            .wait_for_sent(count, Duration::from_secs(5))
            .await
    }

    /// Cancels every loop and waits for them to return.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.loops.close();
        self.loops.wait().await;
        self.webhook_state.tasks.close();
        self.webhook_state.tasks.wait().await;
    }
}
