// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat-facing half of Tasktally.
//!
//! [`NotificationRelay`] drains the authorization and tracking streams into
//! chat messages and session state; [`CommandRouter`] answers what users send
//! back, resolving replies to time prompts before anything else.

pub mod messages;
pub mod relay;
pub mod router;
pub mod shutdown;

pub use relay::{NotificationRelay, RelaySettings};
pub use router::{CommandRouter, RouterSettings};
pub use shutdown::{install_signal_handler, join_loops};
