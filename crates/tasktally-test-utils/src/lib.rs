// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tasktally integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without Telegram, a task tracker, or a database.
//!
//! # Components
//!
//! - [`MockChannel`] - chat channel with message injection and capture
//! - [`MockLedger`] - in-memory task ledger with failure injection
//! - [`MockAuthProvider`] - authorization provider stub
//! - [`TestHarness`] - the webhook router, bus, relay and command router wired together

pub mod harness;
pub mod mock_channel;
pub mod mock_ledger;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_channel::{MockChannel, SentMessage, inbound, reply};
pub use mock_ledger::{MockLedger, StoredTask};
pub use mock_provider::MockAuthProvider;
