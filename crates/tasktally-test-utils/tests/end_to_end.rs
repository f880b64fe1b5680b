// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook-to-chat scenarios through the full stack.

use axum::http::StatusCode;
use serde_json::json;

use tasktally_core::{AuthErrorKind, AuthNotification, ChatId, SessionState, SessionStore};
use tasktally_test_utils::{StoredTask, TestHarness, inbound, reply};

fn completed(user_id: &str, content: &str, labels: serde_json::Value) -> serde_json::Value {
    json!({
        "event_name": "item:completed",
        "user_id": user_id,
        "event_data": {"id": "t-1", "content": content, "labels": labels},
        "triggered_at": "2026-03-01T09:00:00Z",
    })
}

#[tokio::test]
async fn deferred_prompt_then_reply_is_stored() {
    let harness = TestHarness::builder().build();
    harness.ledger.link("U", ChatId(42)).await;
    harness.start_relay().await.unwrap();

    let status = harness
        .post_webhook(completed("U", "Write report", json!(["@track"])))
        .await;
    assert_eq!(status, StatusCode::OK);

    let sent = harness.wait_for_sent(1).await;
    assert_eq!(sent.len(), 1);
    let prompt = &sent[0];
    assert_eq!(prompt.chat_id, ChatId(42));
    assert!(prompt.text.contains("Write report"));

    // the correlation is written after the send; wait for the state flip
    let mut state = SessionState::NoAction;
    for _ in 0..50 {
        state = harness.sessions().get_status(ChatId(42)).await.unwrap();
        if state == SessionState::AwaitingTimeReply {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(state, SessionState::AwaitingTimeReply);

    harness.chat(reply(42, 900, prompt.id, "0130")).await;

    assert_eq!(
        harness.ledger.stored().await,
        vec![StoredTask {
            chat_id: ChatId(42),
            task: "Write report".into(),
            minutes: 90,
        }]
    );
    assert_eq!(
        harness.sessions().get_status(ChatId(42)).await.unwrap(),
        SessionState::NoAction
    );
    let sent = harness.channel.sent_messages().await;
    assert!(sent[1].text.contains("90"));

    harness.shutdown().await;
}

#[tokio::test]
async fn auth_timeout_notifies_chat_and_resets_state() {
    let harness = TestHarness::builder().build();
    harness
        .sessions()
        .set_status(ChatId(42), SessionState::AwaitingAuthorization)
        .await
        .unwrap();
    harness.start_relay().await.unwrap();

    harness
        .publish_auth(&AuthNotification::failure(
            ChatId(42),
            AuthErrorKind::Timeout,
            None,
        ))
        .await
        .unwrap();

    let sent = harness.wait_for_sent(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, ChatId(42));
    assert_eq!(
        sent[0].text,
        tasktally_relay::messages::auth_failure(Some(AuthErrorKind::Timeout))
    );
    assert_ne!(
        sent[0].text,
        tasktally_relay::messages::auth_failure(Some(AuthErrorKind::ProviderError))
    );
    assert_eq!(
        harness.sessions().get_status(ChatId(42)).await.unwrap(),
        SessionState::NoAction
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn labelled_duration_is_stored_without_prompt() {
    let harness = TestHarness::builder().build();
    harness.ledger.link("U", ChatId(7)).await;
    harness.start_relay().await.unwrap();

    harness
        .post_webhook(completed("U", "Review PR", json!(["unrelated", "log0205"])))
        .await;

    let sent = harness.wait_for_sent(1).await;
    assert_eq!(sent[0].text, "Stored 2h 05m for task: Review PR");
    assert_eq!(harness.ledger.stored().await[0].minutes, 125);
    assert_eq!(
        harness.sessions().get_status(ChatId(7)).await.unwrap(),
        SessionState::NoAction
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn events_for_unlinked_accounts_are_dropped() {
    let harness = TestHarness::builder().build();
    harness.start_relay().await.unwrap();

    harness
        .post_webhook(completed("nobody", "Write report", json!(["track"])))
        .await;

    let sent = harness
        .channel
        .wait_for_sent(1, std::time::Duration::from_millis(300))
        .await;
    assert!(sent.is_empty());
    harness.shutdown().await;
}

#[tokio::test]
async fn auth_command_through_router_loop() {
    let harness = TestHarness::builder().build();
    harness.start_router();

    harness.channel.inject_message(inbound(42, 1, "/auth")).await;
    let sent = harness.wait_for_sent(1).await;
    assert!(sent[0].text.contains("https://tally.test/auth?chat_id=42"));
    assert_eq!(
        harness.sessions().get_status(ChatId(42)).await.unwrap(),
        SessionState::AwaitingAuthorization
    );

    harness.channel.inject_message(inbound(42, 2, "hello")).await;
    let sent = harness.wait_for_sent(2).await;
    assert!(sent[1].text.contains("/cancel"));

    harness.shutdown().await;
}

#[tokio::test]
async fn successful_authorization_round_trip() {
    let harness = TestHarness::builder().build();
    harness.start_relay().await.unwrap();

    harness.chat(inbound(42, 1, "/auth")).await;
    harness
        .publish_auth(&AuthNotification::success(ChatId(42)))
        .await
        .unwrap();

    let sent = harness.wait_for_sent(2).await;
    assert_eq!(sent[1].text, tasktally_relay::messages::AUTH_SUCCESS);
    assert_eq!(
        harness.sessions().get_status(ChatId(42)).await.unwrap(),
        SessionState::NoAction
    );
    harness.shutdown().await;
}
