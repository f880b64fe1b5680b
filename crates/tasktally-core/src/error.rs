// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Tasktally.

use thiserror::Error;

/// The primary error type used across all Tasktally adapter traits and core operations.
#[derive(Debug, Error)]
pub enum TasktallyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chat channel errors (send failure, closed inbound stream).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Message bus errors (publish failure, subscription closed).
    #[error("bus error: {message}")]
    Bus {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A payload did not match the shape its producer is contractually bound to.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// External authorization provider errors (token exchange, profile lookup).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A looked-up record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TasktallyError {
    /// Wraps a JSON (de)serialization failure as a [`TasktallyError::Decode`].
    pub fn decode(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
