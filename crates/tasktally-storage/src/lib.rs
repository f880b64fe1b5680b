// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Tasktally.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. On top of that sit
//! the task ledger, the session store, and a durable implementation of the
//! message bus. An in-memory session store is included for tests and
//! single-process runs.

pub mod bus;
pub mod database;
pub mod ledger;
pub mod migrations;
pub mod queue;
pub mod session;

pub use bus::SqliteBus;
pub use database::Database;
pub use ledger::SqliteLedger;
pub use session::{MemorySessionStore, SqliteSessionStore};
