// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Every trait here uses `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` and swapped for mocks in tests.

pub mod adapter;
pub mod channel;
pub mod ledger;
pub mod session;

pub use adapter::PluginAdapter;
pub use channel::ChannelAdapter;
pub use ledger::TaskLedger;
pub use session::SessionStore;
