// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat platform integrations.

use async_trait::async_trait;

use crate::error::TasktallyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundMessage, MessageId, OutboundMessage};

/// Adapter for a bidirectional chat platform.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), TasktallyError>;

    /// Sends a message and returns the id the platform assigned to it.
    ///
    /// The returned id is the correlation key for replies to this message.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, TasktallyError>;

    /// Receives the next inbound message from the channel.
    async fn receive(&self) -> Result<InboundMessage, TasktallyError>;
}
