// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for Tasktally.
//!
//! Implements [`ChannelAdapter`] for the Telegram Bot API via teloxide long
//! polling. Only private chats reach the relay; replies keep the id of the
//! message they answer so deferred prompts can be correlated.

pub mod handler;

use std::sync::Arc;

use async_trait::async_trait;
use tasktally_config::model::TelegramConfig;
use tasktally_core::{
    AdapterType, ChannelAdapter, HealthStatus, InboundMessage, MessageId, OutboundMessage,
    PluginAdapter, TasktallyError,
};
use teloxide::prelude::*;
use teloxide::types::{ChatId as TgChatId, Recipient};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const INBOUND_CAPACITY: usize = 100;

/// Telegram channel adapter implementing [`ChannelAdapter`].
pub struct TelegramChannel {
    bot: Bot,
    config: TelegramConfig,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set and non-empty.
    pub fn new(config: TelegramConfig) -> Result<Self, TasktallyError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            TasktallyError::Config("telegram.bot_token is required for Telegram adapter".into())
        })?;
        if token.trim().is_empty() {
            return Err(TasktallyError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        Ok(Self {
            bot,
            config,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TasktallyError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), TasktallyError> {
        debug!("Telegram channel shutting down");
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn connect(&mut self) -> Result<(), TasktallyError> {
        if self.polling_handle.is_some() {
            return Ok(());
        }

        let bot = self.bot.clone();
        let tx = self.inbound_tx.clone();
        let allowed_users: Arc<Vec<String>> = Arc::new(self.config.allowed_users.clone());

        info!("starting Telegram long polling");

        let handle = tokio::spawn(async move {
            let handler = Update::filter_message().endpoint(move |msg: Message| {
                let tx = tx.clone();
                let allowed = allowed_users.clone();
                async move {
                    if !handler::is_dm(&msg) {
                        debug!(chat_id = msg.chat.id.0, "ignoring non-DM message");
                        return respond(());
                    }
                    if !handler::is_authorized(&msg, &allowed) {
                        debug!(chat_id = msg.chat.id.0, "ignoring unauthorized user");
                        return respond(());
                    }

                    match handler::to_inbound_message(&msg) {
                        Some(inbound) => {
                            if tx.send(inbound).await.is_err() {
                                warn!("inbound channel closed, dropping message");
                            }
                        }
                        None => debug!(msg_id = msg.id.0, "ignoring non-text message"),
                    }
                    respond(())
                }
            });

            Dispatcher::builder(bot, handler)
                .default_handler(|_| async {})
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, TasktallyError> {
        let sent = self
            .bot
            .send_message(Recipient::Id(TgChatId(msg.chat_id.0)), &msg.text)
            .await
            .map_err(|e| TasktallyError::Channel {
                message: format!("failed to send message to chat {}: {e}", msg.chat_id),
                source: Some(Box::new(e)),
            })?;
        Ok(MessageId(i64::from(sent.id.0)))
    }

    async fn receive(&self) -> Result<InboundMessage, TasktallyError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| TasktallyError::Channel {
            message: "Telegram inbound channel closed".into(),
            source: None,
        })
    }
}
