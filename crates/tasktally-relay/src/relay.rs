// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumers of the authorization-outcome and tracking-event streams.
//!
//! Each stream is drained by its own loop. A handler returns `Err` only when
//! it failed before any user-visible side effect, in which case the delivery
//! is nacked and the bus redelivers it. Everything after the first message
//! to the chat is acked regardless of outcome so a redelivery can never
//! duplicate a prompt.

use std::sync::Arc;
use std::time::Duration;

use tasktally_bus::{Delivery, Subscription};
use tasktally_config::model::TrackingConfig;
use tasktally_core::{
    AuthNotification, ChannelAdapter, ChatId, MessageId, NormalizedTrackingEvent,
    OutboundMessage, SessionState, SessionStore, TaskLedger, TasktallyError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::messages;

/// Pause after a failed `next()` before polling the subscription again.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// Settings the relay takes from `[tracking]`.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub pending_reply_ttl: Duration,
    pub ignore_command: String,
}

impl RelaySettings {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            pending_reply_ttl: Duration::from_secs(config.pending_reply_ttl_secs),
            ignore_command: config.ignore_command.clone(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&TrackingConfig::default())
    }
}

/// Delivers bus events to chats and records the resulting session state.
#[derive(Clone)]
pub struct NotificationRelay {
    channel: Arc<dyn ChannelAdapter>,
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn TaskLedger>,
    settings: RelaySettings,
}

impl NotificationRelay {
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn TaskLedger>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            channel,
            sessions,
            ledger,
            settings,
        }
    }

    /// Handles one authorization outcome.
    ///
    /// The session is reset before the chat is told, so a failed reset is
    /// retried by redelivery without the user seeing a duplicate message.
    pub async fn handle_auth_notification(
        &self,
        notification: &AuthNotification,
    ) -> Result<(), TasktallyError> {
        let chat_id = notification.chat_id;
        self.sessions
            .set_status(chat_id, SessionState::NoAction)
            .await?;

        let text = if notification.successful {
            info!(chat_id = %chat_id, "authorization completed");
            messages::AUTH_SUCCESS
        } else {
            warn!(
                chat_id = %chat_id,
                kind = ?notification.error_kind,
                detail = notification.error_detail.as_deref().unwrap_or(""),
                "authorization failed"
            );
            messages::auth_failure(notification.error_kind)
        };

        self.say(chat_id, text).await;
        Ok(())
    }

    /// Handles one normalized tracking event.
    pub async fn handle_tracking_event(
        &self,
        event: &NormalizedTrackingEvent,
    ) -> Result<(), TasktallyError> {
        let Some(chat_id) = self.ledger.resolve_chat_id(&event.user_id).await? else {
            warn!(user_id = %event.user_id, "no chat linked to account, dropping tracking event");
            return Ok(());
        };

        if event.ask_time {
            self.prompt_for_time(chat_id, event).await;
        } else {
            self.store_immediate(chat_id, event).await;
        }
        Ok(())
    }

    async fn store_immediate(&self, chat_id: ChatId, event: &NormalizedTrackingEvent) {
        let minutes = event.time_spent_minutes;
        let text = match self
            .ledger
            .store_completed_task(chat_id, &event.task, minutes)
            .await
        {
            Ok(()) => {
                info!(chat_id = %chat_id, minutes, "tracked task stored");
                messages::stored(&event.task, minutes)
            }
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "failed to store tracked task");
                messages::store_failed(&event.task)
            }
        };
        self.say(chat_id, &text).await;
    }

    async fn prompt_for_time(&self, chat_id: ChatId, event: &NormalizedTrackingEvent) {
        let prompt = messages::time_prompt(&event.task, &self.settings.ignore_command);
        let Some(prompt_id) = self.say(chat_id, &prompt).await else {
            return;
        };

        if let Err(e) = self
            .sessions
            .store_pending_reply(chat_id, prompt_id, event, self.settings.pending_reply_ttl)
            .await
        {
            error!(
                chat_id = %chat_id,
                message_id = %prompt_id,
                error = %e,
                "prompt sent but could not be correlated"
            );
            return;
        }

        if let Err(e) = self
            .sessions
            .set_status(chat_id, SessionState::AwaitingTimeReply)
            .await
        {
            error!(chat_id = %chat_id, error = %e, "failed to set awaiting-time state");
        }
        debug!(chat_id = %chat_id, message_id = %prompt_id, "time prompt sent");
    }

    /// Sends `text`, logging instead of failing. No retry.
    async fn say(&self, chat_id: ChatId, text: &str) -> Option<MessageId> {
        match self.channel.send(OutboundMessage::text(chat_id, text)).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "failed to send chat message");
                None
            }
        }
    }

    /// Consumes authorization outcomes until `cancel` fires or the stream
    /// closes.
    pub async fn run_auth_loop(
        &self,
        subscription: Box<dyn Subscription>,
        cancel: CancellationToken,
    ) {
        info!("authorization relay running");
        consume(subscription, cancel, "auth", |delivery| async move {
            let notification = match delivery.decode::<AuthNotification>() {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "undecodable authorization notification");
                    return settle(delivery, true).await;
                }
            };
            let ok = match self.handle_auth_notification(&notification).await {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        chat_id = %notification.chat_id,
                        error = %e,
                        "authorization notification not handled"
                    );
                    false
                }
            };
            settle(delivery, ok).await;
        })
        .await;
        info!("authorization relay stopped");
    }

    /// Consumes tracking events until `cancel` fires or the stream closes.
    pub async fn run_webhook_loop(
        &self,
        subscription: Box<dyn Subscription>,
        cancel: CancellationToken,
    ) {
        info!("tracking relay running");
        consume(subscription, cancel, "webhook", |delivery| async move {
            let event = match delivery.decode::<NormalizedTrackingEvent>() {
                Ok(ev) => ev,
                Err(e) => {
                    error!(error = %e, "undecodable tracking event");
                    return settle(delivery, true).await;
                }
            };
            let ok = match self.handle_tracking_event(&event).await {
                Ok(()) => true,
                Err(e) => {
                    error!(user_id = %event.user_id, error = %e, "tracking event not handled");
                    false
                }
            };
            settle(delivery, ok).await;
        })
        .await;
        info!("tracking relay stopped");
    }
}

/// Pulls deliveries one at a time. The handler always runs to completion;
/// cancellation is only observed between deliveries.
async fn consume<F, Fut>(
    mut subscription: Box<dyn Subscription>,
    cancel: CancellationToken,
    stream: &'static str,
    mut handle: F,
) where
    F: FnMut(Delivery) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = subscription.next() => next,
        };

        match next {
            Ok(Some(delivery)) => {
                if delivery.attempt() > 1 {
                    debug!(stream, attempt = delivery.attempt(), "redelivered event");
                }
                handle(delivery).await;
            }
            Ok(None) => {
                warn!(stream, "subscription closed");
                break;
            }
            Err(e) => {
                error!(stream, error = %e, "failed to receive from bus");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                }
            }
        }
    }
}

async fn settle(delivery: Delivery, ok: bool) {
    let result = if ok {
        delivery.ack().await
    } else {
        delivery.nack().await
    };
    if let Err(e) = result {
        error!(error = %e, "failed to settle bus delivery");
    }
}
