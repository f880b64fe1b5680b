// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Tasktally.
//!
//! This crate provides the error type, the wire types that cross the bus and
//! the session store, and the adapter traits every other crate programs
//! against.

pub mod error;
pub mod traits;
pub mod types;

pub use error::TasktallyError;
pub use types::{
    AdapterType, AuthErrorKind, AuthNotification, ChatId, HealthStatus, InboundMessage,
    LinkedAccount, MessageId, NormalizedTrackingEvent, OutboundMessage, SessionState, TaskStats,
    TrackedTask,
};

pub use traits::{ChannelAdapter, PluginAdapter, SessionStore, TaskLedger};
