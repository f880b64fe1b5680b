// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tasktally serve` command implementation.
//!
//! Opens the database, builds the durable bus, session store and ledger on
//! it, and runs the webhook server, the authorization sweeper, the Telegram
//! adapter, both relay loops and the command router until SIGINT or
//! SIGTERM.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::task::TaskTracker;
use tracing::{error, info};

use tasktally_bus::EventBus;
use tasktally_config::TasktallyConfig;
use tasktally_core::{ChannelAdapter, SessionStore, TaskLedger, TasktallyError};
use tasktally_relay::{
    CommandRouter, NotificationRelay, RelaySettings, RouterSettings, install_signal_handler,
    join_loops,
};
use tasktally_storage::{Database, SqliteBus, SqliteLedger, SqliteSessionStore};
use tasktally_telegram::TelegramChannel;
use tasktally_tracker::{ClassifierConfig, EventClassifier};
use tasktally_webhook::{
    AuthSettings, HealthState, ReqwestAuthProvider, Topics, WebhookState, run_sweeper,
    start_server,
};

/// Runs until a shutdown signal arrives or the HTTP server fails.
pub async fn run_serve(config: TasktallyConfig) -> Result<(), TasktallyError> {
    init_tracing(&config.agent.log_level, config.logging.json);

    info!(name = %config.agent.name, "starting tasktally serve");

    let cancel = install_signal_handler();
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);

    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "database opened");

    let bus: Arc<dyn EventBus> = Arc::new(SqliteBus::from_config(db.clone(), &config.bus));
    let sessions: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(
        db.clone(),
        Duration::from_secs(config.tracking.status_ttl_secs),
    ));
    let ledger: Arc<dyn TaskLedger> = Arc::new(SqliteLedger::new(db.clone()));
    let provider = Arc::new(ReqwestAuthProvider::new(&config.oauth)?);

    let mut telegram = TelegramChannel::new(config.telegram.clone())?;
    telegram.connect().await?;
    let channel: Arc<dyn ChannelAdapter> = Arc::new(telegram);

    let classifier = EventClassifier::new(ClassifierConfig {
        completion_event: config.tracking.completion_event.clone(),
        ask_labels: config.tracking.ask_labels.clone(),
        log_label_prefixes: config.tracking.log_label_prefixes.clone(),
    });

    let state = WebhookState {
        classifier: Arc::new(classifier),
        bus: bus.clone(),
        sessions: sessions.clone(),
        ledger: ledger.clone(),
        provider,
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

    let server_config = config.server.clone();
    let server_cancel = cancel.clone();
    let mut server =
        tokio::spawn(async move { start_server(&server_config, state, server_cancel).await });

    let sweeper = tokio::spawn(run_sweeper(
        sessions.clone(),
        bus.clone(),
        config.bus.auth_topic.clone(),
        Duration::from_secs(config.oauth.sweep_interval_secs),
        cancel.clone(),
    ));

    let relay = NotificationRelay::new(
        channel.clone(),
        sessions.clone(),
        ledger.clone(),
        RelaySettings::from_config(&config.tracking),
    );
    let auth_sub = bus.subscribe(&config.bus.auth_topic).await?;
    let webhook_sub = bus.subscribe(&config.bus.webhook_topic).await?;

    let auth_loop = {
        let relay = relay.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run_auth_loop(auth_sub, cancel).await })
    };
    let webhook_loop = {
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run_webhook_loop(webhook_sub, cancel).await })
    };

    let router = CommandRouter::new(
        channel.clone(),
        sessions.clone(),
        ledger.clone(),
        RouterSettings::from_config(&config.tracking, &config.server),
    );
    let router_loop = {
        let cancel = cancel.clone();
        tokio::spawn(async move { router.run(cancel).await })
    };

    info!("tasktally is running");

    let server_result = tokio::select! {
        result = &mut server => {
            // the server only returns early on failure
            cancel.cancel();
            result
        }
        _ = cancel.cancelled() => server.await,
    };
    let server_result = server_result
        .map_err(|e| TasktallyError::Internal(format!("HTTP server task failed: {e}")))
        .and_then(|r| r);

    join_loops(
        vec![
            ("auth-relay", auth_loop),
            ("webhook-relay", webhook_loop),
            ("command-router", router_loop),
            ("auth-sweeper", sweeper),
        ],
        grace,
    )
    .await;

    if let Err(e) = channel.shutdown().await {
        error!(error = %e, "channel shutdown failed");
    }
    if let Err(e) = db.close().await {
        error!(error = %e, "database close failed");
    }

    info!("tasktally stopped");
    server_result
}

/// `RUST_LOG` wins; otherwise `tasktally={level},warn`.
fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tasktally={log_level},warn")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
