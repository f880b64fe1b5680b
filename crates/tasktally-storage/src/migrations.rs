// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations, applied on every open.

use tasktally_core::TasktallyError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Refinery records applied versions in `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), TasktallyError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| TasktallyError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
