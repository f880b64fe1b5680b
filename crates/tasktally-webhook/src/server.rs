// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the webhook and
//! authorization endpoints.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tasktally_bus::EventBus;
use tasktally_config::model::{OAuthConfig, ServerConfig};
use tasktally_core::{SessionStore, TaskLedger, TasktallyError};
use tasktally_tracker::EventClassifier;

use crate::auth;
use crate::handlers;
use crate::provider::AuthProvider;

/// Process start time for the health endpoint.
#[derive(Debug, Clone)]
pub struct HealthState {
    pub start_time: Instant,
}

/// Settings for issuing authorization redirects.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub authorize_url: String,
    /// `None` disables `/auth`.
    pub client_id: Option<String>,
    pub scope: String,
    pub state_ttl: Duration,
}

impl AuthSettings {
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            authorize_url: config.authorize_url.clone(),
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
            state_ttl: Duration::from_secs(config.state_ttl_secs),
        }
    }
}

/// Bus topics the server publishes to.
#[derive(Debug, Clone)]
pub struct Topics {
    pub webhook: String,
    pub auth: String,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub classifier: Arc<EventClassifier>,
    pub bus: Arc<dyn EventBus>,
    pub sessions: Arc<dyn SessionStore>,
    pub ledger: Arc<dyn TaskLedger>,
    pub provider: Arc<dyn AuthProvider>,
    pub auth: AuthSettings,
    pub topics: Topics,
    /// Background classification tasks, drained on shutdown.
    pub tasks: TaskTracker,
    pub health: HealthState,
}

/// Builds the application router.
///
/// - POST /webhook
/// - GET /auth, GET /auth/callback, GET /auth/finish
/// - GET /health
pub fn router(state: WebhookState, max_body_bytes: usize) -> Router {
    let webhook_routes = Router::new()
        .route("/webhook", post(handlers::post_webhook))
        .layer(DefaultBodyLimit::max(max_body_bytes));

    Router::new()
        .merge(webhook_routes)
        .route("/auth", get(auth::get_auth))
        .route("/auth/callback", get(auth::get_callback))
        .route("/auth/finish", get(auth::get_finish))
        .route("/health", get(handlers::get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `cancel` fires, then gives in-flight background tasks
/// `config.shutdown_grace_secs` to finish before abandoning them.
pub async fn start_server(
    config: &ServerConfig,
    state: WebhookState,
    cancel: CancellationToken,
) -> Result<(), TasktallyError> {
    let tasks = state.tasks.clone();
    let app = router(state, config.max_body_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TasktallyError::Channel {
            message: format!("failed to bind HTTP server to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| TasktallyError::Channel {
            message: format!("HTTP server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    drain(tasks, Duration::from_secs(config.shutdown_grace_secs)).await;
    Ok(())
}

/// Waits up to `grace` for tracked tasks. Stragglers are left running
/// and die with the runtime.
pub async fn drain(tasks: TaskTracker, grace: Duration) {
    tasks.close();
    if tokio::time::timeout(grace, tasks.wait()).await.is_err() {
        warn!(
            remaining = tasks.len(),
            "shutdown grace period elapsed, abandoning background tasks"
        );
    } else {
        info!("background tasks drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_settings_follow_config() {
        let config = OAuthConfig {
            client_id: Some("cid".into()),
            state_ttl_secs: 120,
            ..OAuthConfig::default()
        };
        let settings = AuthSettings::from_config(&config);
        assert_eq!(settings.client_id.as_deref(), Some("cid"));
        assert_eq!(settings.state_ttl, Duration::from_secs(120));
        assert_eq!(settings.authorize_url, config.authorize_url);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_abandons_slow_tasks_after_grace() {
        let tasks = TaskTracker::new();
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let started = tokio::time::Instant::now();
        drain(tasks.clone(), Duration::from_secs(2)).await;
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn drain_returns_once_tasks_finish() {
        let tasks = TaskTracker::new();
        tasks.spawn(async {});
        drain(tasks.clone(), Duration::from_secs(30)).await;
        assert!(tasks.is_empty());
    }
}
