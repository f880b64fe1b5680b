// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply correlation and state dispatch of the command router.

use std::sync::Arc;
use std::time::Duration;

use tasktally_core::{
    ChatId, MessageId, NormalizedTrackingEvent, SessionState, SessionStore,
};
use tasktally_relay::{CommandRouter, RouterSettings, messages};
use tasktally_storage::MemorySessionStore;
use tasktally_test_utils::{MockChannel, MockLedger, StoredTask, inbound, reply};
use tokio_util::sync::CancellationToken;

const CHAT: ChatId = ChatId(42);
const PROMPT: MessageId = MessageId(500);

struct Fixture {
    channel: Arc<MockChannel>,
    ledger: Arc<MockLedger>,
    sessions: Arc<MemorySessionStore>,
    router: CommandRouter,
}

fn fixture() -> Fixture {
    let channel = Arc::new(MockChannel::new());
    let ledger = Arc::new(MockLedger::new());
    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(3600)));
    let router = CommandRouter::new(
        channel.clone(),
        sessions.clone(),
        ledger.clone(),
        RouterSettings {
            ignore_command: "/ignore_task".into(),
            cancel_command: "/cancel".into(),
            public_base_url: "https://tally.example/".into(),
        },
    );
    Fixture {
        channel,
        ledger,
        sessions,
        router,
    }
}

async fn pending_prompt(f: &Fixture, task: &str) {
    f.sessions
        .store_pending_reply(
            CHAT,
            PROMPT,
            &NormalizedTrackingEvent::deferred("U", task),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();
    f.sessions
        .set_status(CHAT, SessionState::AwaitingTimeReply)
        .await
        .unwrap();
}

async fn answer(f: &Fixture, msg: tasktally_core::InboundMessage) -> Option<String> {
    f.router.route(&msg).await.unwrap()
}

#[tokio::test]
async fn reply_with_time_stores_and_resets() {
    let f = fixture();
    pending_prompt(&f, "Write report").await;

    let text = answer(&f, reply(42, 1, PROMPT, "0130")).await.unwrap();
    assert_eq!(text, "Stored 1h 30m (90 min) for task: Write report");
    assert_eq!(
        f.ledger.stored().await,
        vec![StoredTask {
            chat_id: CHAT,
            task: "Write report".into(),
            minutes: 90
        }]
    );
    assert_eq!(f.sessions.get_status(CHAT).await.unwrap(), SessionState::NoAction);
}

#[tokio::test]
async fn trailing_text_after_four_digits_is_tolerated() {
    let f = fixture();
    pending_prompt(&f, "Write report").await;
    let text = answer(&f, reply(42, 1, PROMPT, "0205 roughly")).await.unwrap();
    assert!(text.contains("(125 min)"));
}

#[tokio::test]
async fn leading_whitespace_before_digits_is_rejected() {
    let f = fixture();
    pending_prompt(&f, "Write report").await;

    let text = answer(&f, reply(42, 1, PROMPT, "  0130")).await.unwrap();
    assert_eq!(text, messages::reply_format_error("/ignore_task"));
    assert!(f.ledger.stored().await.is_empty());
}

#[tokio::test]
async fn unparseable_reply_consumes_prompt_and_keeps_state() {
    let f = fixture();
    pending_prompt(&f, "Write report").await;

    let text = answer(&f, reply(42, 1, PROMPT, "an hour")).await.unwrap();
    assert_eq!(text, messages::reply_format_error("/ignore_task"));
    assert!(f.ledger.stored().await.is_empty());
    assert_eq!(
        f.sessions.get_status(CHAT).await.unwrap(),
        SessionState::AwaitingTimeReply
    );

    // a second attempt no longer correlates
    let text = answer(&f, reply(42, 2, PROMPT, "0130")).await.unwrap();
    assert_eq!(text, messages::awaiting_time_reply("/ignore_task"));
    assert!(f.ledger.stored().await.is_empty());
}

#[tokio::test]
async fn ignore_reply_clears_prompt() {
    let f = fixture();
    pending_prompt(&f, "Write report").await;

    let text = answer(&f, reply(42, 1, PROMPT, "/ignore_task")).await.unwrap();
    assert_eq!(text, messages::IGNORED);
    assert_eq!(f.sessions.get_status(CHAT).await.unwrap(), SessionState::NoAction);
    assert!(
        f.sessions
            .take_pending_reply(CHAT, PROMPT)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn ignore_without_pending_prompt_still_acknowledges() {
    let f = fixture();
    let text = answer(&f, reply(42, 1, MessageId(9), "/ignore_task@tasktally_bot"))
        .await
        .unwrap();
    assert_eq!(text, messages::IGNORED);
}

#[tokio::test]
async fn failed_store_reports_failure() {
    let f = fixture();
    pending_prompt(&f, "Write report").await;
    f.ledger.fail_stores(true);

    let text = answer(&f, reply(42, 1, PROMPT, "0130")).await.unwrap();
    assert_eq!(text, messages::store_failed("Write report"));
}

#[tokio::test]
async fn non_reply_while_awaiting_time_points_at_prompt() {
    let f = fixture();
    pending_prompt(&f, "Write report").await;
    let text = answer(&f, inbound(42, 1, "0130")).await.unwrap();
    assert_eq!(text, messages::awaiting_time_reply("/ignore_task"));
    assert!(f.ledger.stored().await.is_empty());
}

#[tokio::test]
async fn auth_then_cancel() {
    let f = fixture();

    let text = answer(&f, inbound(42, 1, "/auth")).await.unwrap();
    assert!(text.ends_with("https://tally.example/auth?chat_id=42"));
    assert_eq!(
        f.sessions.get_status(CHAT).await.unwrap(),
        SessionState::AwaitingAuthorization
    );

    let text = answer(&f, inbound(42, 2, "/stats")).await.unwrap();
    assert_eq!(text, messages::awaiting_authorization("/cancel"));

    let text = answer(&f, inbound(42, 3, "/cancel")).await.unwrap();
    assert_eq!(text, messages::AUTH_CANCELLED);
    assert_eq!(f.sessions.get_status(CHAT).await.unwrap(), SessionState::NoAction);
}

#[tokio::test]
async fn start_welcomes_new_and_returning_chats() {
    let f = fixture();
    let first = answer(&f, inbound(42, 1, "/start")).await.unwrap();
    assert!(first.starts_with(messages::WELCOME));
    assert!(first.contains("/stats"));
    let again = answer(&f, inbound(42, 2, "/start@tasktally_bot")).await.unwrap();
    assert_eq!(again, messages::WELCOME_BACK);
}

#[tokio::test]
async fn stats_and_unknown_text() {
    let f = fixture();
    assert_eq!(
        answer(&f, inbound(42, 1, "/stats")).await.unwrap(),
        messages::NO_STATS
    );

    use tasktally_core::TaskLedger;
    f.ledger
        .store_completed_task(CHAT, "Write report", 90)
        .await
        .unwrap();
    let text = answer(&f, inbound(42, 2, "/stats")).await.unwrap();
    assert!(text.contains("Total tracked: 1h 30m"));
    assert!(text.contains("Write report: 1h 30m"));

    assert_eq!(answer(&f, inbound(42, 3, "hello there")).await, None);
    assert_eq!(answer(&f, inbound(42, 4, "/cancel")).await, None);
}

#[tokio::test]
async fn run_answers_and_stops_when_channel_closes() {
    let f = fixture();
    f.channel.inject_message(inbound(42, 1, "/help")).await;
    f.channel.close();

    tokio::time::timeout(Duration::from_secs(5), f.router.run(CancellationToken::new()))
        .await
        .unwrap();

    let sent = f.channel.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, CHAT);
    assert!(sent[0].text.contains("/auth"));
}

#[tokio::test]
async fn handle_survives_send_failure() {
    let f = fixture();
    f.channel.fail_sends(true);
    f.router.handle(inbound(42, 1, "/help")).await;
    assert_eq!(f.channel.sent_count().await, 0);
}
