// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shutdown signal handling.
//!
//! SIGTERM and SIGINT cancel one shared [`CancellationToken`] that the HTTP
//! server, the sweeper, both relay loops and the command router observe.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                        _ = token_clone.cancelled() => return,
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    tokio::select! {
                        _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
                        _ = token_clone.cancelled() => return,
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
                _ = token_clone.cancelled() => return,
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Waits up to `grace` for the long-lived loops to return, aborting the
/// rest. Returns how many were aborted.
pub async fn join_loops(handles: Vec<(&'static str, JoinHandle<()>)>, grace: Duration) -> usize {
    let mut aborted = 0;
    let deadline = tokio::time::Instant::now() + grace;
    for (name, mut handle) in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => debug!(task = name, "task stopped"),
            Ok(Err(e)) => error!(task = name, error = %e, "task panicked"),
            Err(_) => {
                warn!(task = name, "task did not stop within grace period, aborting");
                handle.abort();
                aborted += 1;
            }
        }
    }
    aborted
}
