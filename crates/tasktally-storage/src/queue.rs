// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe message processing.
//!
//! A claimed entry is locked until `locked_until`. If it is neither acked nor
//! failed by then, the next dequeue on that queue puts it back in play and
//! counts the lapse as an attempt.
//!
//! A failed entry that still has attempts left waits out a backoff before it
//! can be claimed again; it does not hold back newer entries meanwhile.
//! Settled entries (`completed`, `failed`) are kept for a retention window
//! and then removed by [`purge_settled`].

use std::time::Duration;

use rusqlite::params;
use tasktally_core::TasktallyError;

use crate::database::{Database, map_tr_err};

/// A row of the `queue` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: Vec<u8>,
    pub status: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: Vec<u8>,
    max_attempts: u32,
) -> Result<i64, TasktallyError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                params![queue_name, payload, max_attempts],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

fn lock_modifier(delay: Duration) -> String {
    format!("+{:.3} seconds", delay.as_secs_f64())
}

fn age_modifier(age: Duration) -> String {
    format!("-{:.3} seconds", age.as_secs_f64())
}

/// Claim the oldest pending entry of `queue_name` for `visibility`.
///
/// Returns `None` when nothing is pending.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    visibility: Duration,
) -> Result<Option<QueueEntry>, TasktallyError> {
    let queue_name = queue_name.to_string();
    let modifier = lock_modifier(visibility);
    db.connection()
        .call(move |conn| -> Result<Option<QueueEntry>, rusqlite::Error> {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE queue SET
                     status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'pending' END,
                     attempts = attempts + 1,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE queue_name = ?1 AND status = 'processing'
                   AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![queue_name],
            )?;

            let result = tx.query_row(
                "SELECT id, queue_name, payload, status, attempts, max_attempts,
                        created_at, updated_at, locked_until
                 FROM queue
                 WHERE queue_name = ?1 AND status = 'pending'
                   AND (locked_until IS NULL
                        OR locked_until <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ORDER BY id ASC
                 LIMIT 1",
                params![queue_name],
                |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                        locked_until: row.get(8)?,
                    })
                },
            );

            match result {
                Ok(entry) => {
                    let locked_until: String = tx.query_row(
                        "UPDATE queue SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1
                         RETURNING locked_until",
                        params![entry.id, modifier],
                        |row| row.get(0),
                    )?;
                    tx.commit()?;
                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        locked_until: Some(locked_until),
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge successful processing of a queue entry.
pub async fn ack(db: &Database, id: i64) -> Result<(), TasktallyError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a queue entry as failed.
///
/// Increments attempts. At `max_attempts` the entry is parked as "failed";
/// otherwise it goes back to "pending", held back for `backoff`. Returns
/// `true` if the entry will be delivered again.
pub async fn fail(db: &Database, id: i64, backoff: Duration) -> Result<bool, TasktallyError> {
    let modifier = lock_modifier(backoff);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let (attempts, max_attempts): (u32, u32) = conn.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let retry = new_attempts < max_attempts;
            if retry {
                conn.execute(
                    "UPDATE queue SET status = 'pending', attempts = ?1,
                     locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?3",
                    params![new_attempts, modifier, id],
                )?;
            } else {
                conn.execute(
                    "UPDATE queue SET status = 'failed', attempts = ?1,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![new_attempts, id],
                )?;
            }
            Ok(retry)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes `completed` entries settled more than `completed_after` ago and
/// `failed` entries settled more than `failed_after` ago, across all queues.
pub async fn purge_settled(
    db: &Database,
    completed_after: Duration,
    failed_after: Duration,
) -> Result<usize, TasktallyError> {
    let completed = age_modifier(completed_after);
    let failed = age_modifier(failed_after);
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM queue
                 WHERE (status = 'completed'
                        AND updated_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1))
                    OR (status = 'failed'
                        AND updated_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2))",
                params![completed, failed],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Number of entries of `queue_name` in `status`.
pub async fn count(db: &Database, queue_name: &str, status: &str) -> Result<u64, TasktallyError> {
    let queue_name = queue_name.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE queue_name = ?1 AND status = ?2",
                params![queue_name, status],
                |row| row.get(0),
            )
        })
        .await
        .map(|n| u64::try_from(n).unwrap_or_default())
        .map_err(map_tr_err)
}
