// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The deferred-prompt flow on SQLite, across a restart.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tasktally_bus::{EventBus, publish_json};
use tasktally_core::{ChatId, NormalizedTrackingEvent, SessionState, SessionStore};
use tasktally_relay::{CommandRouter, NotificationRelay, RelaySettings, RouterSettings};
use tasktally_storage::{Database, SqliteBus, SqliteSessionStore};
use tasktally_test_utils::{MockChannel, MockLedger, reply};

const STATUS_TTL: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn prompt_correlation_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasktally.db");
    let path = path.to_str().unwrap();
    let ledger = Arc::new(MockLedger::new());
    ledger.link("U", ChatId(42)).await;

    // first process: the relay sends the prompt
    let prompt_id = {
        let db = Database::open(path).await.unwrap();
        let bus = SqliteBus::new(
            db.clone(),
            Duration::from_millis(10),
            Duration::from_secs(30),
            3,
        );
        let sessions = Arc::new(SqliteSessionStore::new(db.clone(), STATUS_TTL));
        let channel = Arc::new(MockChannel::new());
        let relay = NotificationRelay::new(
            channel.clone(),
            sessions,
            ledger.clone(),
            RelaySettings::default(),
        );

        publish_json(
            &bus,
            "webhook",
            &NormalizedTrackingEvent::deferred("U", "Write report"),
        )
        .await
        .unwrap();

        let sub = bus.subscribe("webhook").await.unwrap();
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move { relay.run_webhook_loop(sub, loop_cancel).await });

        let sent = channel.wait_for_sent(1, Duration::from_secs(5)).await;
        assert_eq!(sent.len(), 1);

        cancel.cancel();
        handle.await.unwrap();
        db.close().await.unwrap();
        sent[0].id
    };

    // second process: the reply arrives
    let db = Database::open(path).await.unwrap();
    let sessions = Arc::new(SqliteSessionStore::new(db.clone(), STATUS_TTL));
    assert_eq!(
        sessions.get_status(ChatId(42)).await.unwrap(),
        SessionState::AwaitingTimeReply
    );

    let channel = Arc::new(MockChannel::new());
    let router = CommandRouter::new(
        channel.clone(),
        sessions.clone(),
        ledger.clone(),
        RouterSettings::default(),
    );
    router.handle(reply(42, 77, prompt_id, "0130")).await;

    let stored = ledger.stored().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].minutes, 90);
    assert_eq!(
        channel.sent_messages().await[0].text,
        "Stored 1h 30m (90 min) for task: Write report"
    );
    assert_eq!(
        sessions.get_status(ChatId(42)).await.unwrap(),
        SessionState::NoAction
    );
}
