// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP front door for Tasktally.
//!
//! Receives task-tracker webhooks and hands them to the classifier off the
//! request path, runs the delegated-authorization redirect and callback, and
//! sweeps authorizations that were never completed.

pub mod auth;
pub mod handlers;
pub mod provider;
pub mod server;
pub mod sweeper;

pub use provider::{AuthProvider, ReqwestAuthProvider};
pub use server::{AuthSettings, HealthState, Topics, WebhookState, router, start_server};
pub use sweeper::{run_sweeper, sweep_once};
