// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic expiry of session entries.
//!
//! Lapsed authorization tokens become timeout notifications on the auth
//! topic; other expired entries are simply dropped, as are bus deliveries
//! settled longer ago than the bus retention.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use tasktally_bus::{EventBus, publish_json};
use tasktally_core::{AuthErrorKind, AuthNotification, SessionStore, TasktallyError};

/// One sweep. Returns how many timeout notifications were published.
pub async fn sweep_once(
    sessions: &dyn SessionStore,
    bus: &dyn EventBus,
    auth_topic: &str,
) -> Result<usize, TasktallyError> {
    let expired = sessions.expire_pending_auth().await?;
    let mut published = 0;
    for chat_id in expired {
        let notification = AuthNotification::failure(chat_id, AuthErrorKind::Timeout, None);
        match publish_json(bus, auth_topic, &notification).await {
            Ok(()) => {
                published += 1;
                info!(chat_id = %chat_id, "authorization timed out");
            }
            Err(e) => error!(chat_id = %chat_id, error = %e, "failed to publish auth timeout"),
        }
    }

    let purged = sessions.purge_expired().await?;
    if purged > 0 {
        debug!(purged, "expired session entries removed");
    }
    if let Err(e) = bus.purge_settled().await {
        error!(error = %e, "failed to purge settled bus entries");
    }
    Ok(published)
}

/// Sweeps every `interval` until `cancel` fires.
pub async fn run_sweeper(
    sessions: Arc<dyn SessionStore>,
    bus: Arc<dyn EventBus>,
    auth_topic: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "session sweeper started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = sweep_once(sessions.as_ref(), bus.as_ref(), &auth_topic).await {
                    error!(error = %e, "session sweep failed");
                }
            }
        }
    }
    info!("session sweeper stopped");
}
