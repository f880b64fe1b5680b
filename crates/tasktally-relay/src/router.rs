// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound chat message routing.
//!
//! A reply to a correlated prompt is resolved first, ahead of any session
//! state. Everything else is dispatched on the chat's [`SessionState`]; in
//! `NoAction` the ordinary commands apply.

use std::sync::Arc;

use tasktally_config::model::{ServerConfig, TrackingConfig};
use tasktally_core::{
    ChannelAdapter, ChatId, InboundMessage, MessageId, OutboundMessage, SessionState,
    SessionStore, TaskLedger, TasktallyError,
};
use tasktally_tracker::decode_free_text_duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::messages;

/// Settings the router takes from `[tracking]` and `[server]`.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub ignore_command: String,
    pub cancel_command: String,
    pub public_base_url: String,
}

impl RouterSettings {
    pub fn from_config(tracking: &TrackingConfig, server: &ServerConfig) -> Self {
        Self {
            ignore_command: tracking.ignore_command.clone(),
            cancel_command: tracking.cancel_command.clone(),
            public_base_url: server.public_base_url.clone(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&TrackingConfig::default(), &ServerConfig::default())
    }
}

/// First word of `text` with any `@botname` suffix removed.
fn command_of(text: &str) -> &str {
    let word = text.split_whitespace().next().unwrap_or("");
    if word.starts_with('/') {
        word.split('@').next().unwrap_or(word)
    } else {
        word
    }
}

/// Routes inbound chat messages and answers them.
#[derive(Clone)]
pub struct CommandRouter {
    channel: Arc<dyn ChannelAdapter>,
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn TaskLedger>,
    settings: RouterSettings,
}

impl CommandRouter {
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn TaskLedger>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            channel,
            sessions,
            ledger,
            settings,
        }
    }

    /// Computes the answer to `msg`, applying its state transitions.
    /// `None` means the message needs no answer.
    pub async fn route(&self, msg: &InboundMessage) -> Result<Option<String>, TasktallyError> {
        let command = command_of(&msg.text);

        if let Some(prompt_id) = msg.reply_to {
            if command == self.settings.ignore_command {
                return self.ignore_prompt(msg.chat_id, prompt_id).await.map(Some);
            }
            if let Some(event) = self
                .sessions
                .take_pending_reply(msg.chat_id, prompt_id)
                .await?
            {
                return self
                    .finish_prompt(msg.chat_id, &event.task, &msg.text)
                    .await
                    .map(Some);
            }
            debug!(chat_id = %msg.chat_id, message_id = %prompt_id, "reply to uncorrelated message");
        }

        match self.sessions.get_status(msg.chat_id).await? {
            SessionState::AwaitingAuthorization => {
                if command == self.settings.cancel_command {
                    self.sessions
                        .set_status(msg.chat_id, SessionState::NoAction)
                        .await?;
                    info!(chat_id = %msg.chat_id, "authorization cancelled");
                    Ok(Some(messages::AUTH_CANCELLED.to_string()))
                } else {
                    Ok(Some(messages::awaiting_authorization(
                        &self.settings.cancel_command,
                    )))
                }
            }
            SessionState::AwaitingTimeReply => Ok(Some(messages::awaiting_time_reply(
                &self.settings.ignore_command,
            ))),
            SessionState::NoAction => self.command(msg, command).await,
        }
    }

    async fn ignore_prompt(
        &self,
        chat_id: ChatId,
        prompt_id: MessageId,
    ) -> Result<String, TasktallyError> {
        match self.sessions.take_pending_reply(chat_id, prompt_id).await {
            Ok(Some(event)) => debug!(chat_id = %chat_id, task = %event.task, "prompt ignored"),
            Ok(None) => debug!(chat_id = %chat_id, "ignore for uncorrelated prompt"),
            Err(e) => error!(chat_id = %chat_id, error = %e, "failed to clear pending reply"),
        }
        self.sessions
            .set_status(chat_id, SessionState::NoAction)
            .await?;
        Ok(messages::IGNORED.to_string())
    }

    /// The correlation entry is already consumed here; a reply that does
    /// not parse cannot be retried against the same prompt.
    async fn finish_prompt(
        &self,
        chat_id: ChatId,
        task: &str,
        text: &str,
    ) -> Result<String, TasktallyError> {
        let Some(minutes) = decode_free_text_duration(text) else {
            debug!(chat_id = %chat_id, "time reply did not parse");
            return Ok(messages::reply_format_error(&self.settings.ignore_command));
        };

        let answer = match self
            .ledger
            .store_completed_task(chat_id, task, minutes)
            .await
        {
            Ok(()) => {
                info!(chat_id = %chat_id, minutes, "replied time stored");
                messages::reply_stored(task, minutes)
            }
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "failed to store replied time");
                messages::store_failed(task)
            }
        };
        self.sessions
            .set_status(chat_id, SessionState::NoAction)
            .await?;
        Ok(answer)
    }

    async fn command(
        &self,
        msg: &InboundMessage,
        command: &str,
    ) -> Result<Option<String>, TasktallyError> {
        let chat_id = msg.chat_id;
        let answer = match command {
            "/start" => {
                let created = self
                    .ledger
                    .register_chat(chat_id, msg.sender_name.as_deref())
                    .await?;
                if created {
                    info!(chat_id = %chat_id, "chat registered");
                    format!(
                        "{}\n\n{}",
                        messages::WELCOME,
                        messages::help(&self.settings.ignore_command, &self.settings.cancel_command)
                    )
                } else {
                    messages::WELCOME_BACK.to_string()
                }
            }
            "/help" => {
                messages::help(&self.settings.ignore_command, &self.settings.cancel_command)
            }
            "/auth" => {
                self.sessions
                    .set_status(chat_id, SessionState::AwaitingAuthorization)
                    .await?;
                messages::auth_link(&self.settings.public_base_url, chat_id.0)
            }
            "/stats" => messages::stats(&self.ledger.stats(chat_id).await?),
            _ => return Ok(None),
        };
        Ok(Some(answer))
    }

    /// Routes `msg` and sends the answer. Routing failures are reported to
    /// the chat as transient; send failures are logged and not retried.
    pub async fn handle(&self, msg: InboundMessage) {
        let chat_id = msg.chat_id;
        let answer = match self.route(&msg).await {
            Ok(Some(answer)) => answer,
            Ok(None) => return,
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "failed to route chat message");
                messages::TRANSIENT_FAILURE.to_string()
            }
        };
        if let Err(e) = self
            .channel
            .send(OutboundMessage::text(chat_id, answer))
            .await
        {
            error!(chat_id = %chat_id, error = %e, "failed to send reply");
        }
    }

    /// Receives chat messages until `cancel` fires or the channel closes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("command router running");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping command router");
                    break;
                }
                msg = self.channel.receive() => match msg {
                    Ok(inbound) => self.handle(inbound).await,
                    Err(e) => {
                        // receive only fails once the inbound stream is gone
                        error!(error = %e, "channel receive error");
                        break;
                    }
                },
            }
        }
        info!("command router stopped");
    }
}
