// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion and health handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use tasktally_bus::{EventBus, publish_json};
use tasktally_tracker::{Classification, EventClassifier, RawWebhookEvent};

use crate::server::WebhookState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// POST /webhook
///
/// Structural decode happens inline; classification and publishing run on
/// a tracked background task so the response never waits on the bus.
pub async fn post_webhook(State(state): State<WebhookState>, body: Bytes) -> Response {
    let event = match RawWebhookEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "rejecting malformed webhook");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    debug!(event = %event.event_name, user_id = %event.user_id, "webhook accepted");
    let classifier = state.classifier.clone();
    let bus = state.bus.clone();
    let topic = state.topics.webhook.clone();
    state
        .tasks
        .spawn(async move { classify_and_publish(&classifier, bus, &topic, event).await });

    StatusCode::OK.into_response()
}

/// Classifies one webhook and publishes the resulting event, if any.
///
/// Failures are logged; redelivery is left to the webhook sender.
pub async fn classify_and_publish(
    classifier: &EventClassifier,
    bus: Arc<dyn EventBus>,
    topic: &str,
    event: RawWebhookEvent,
) {
    let classification = match classifier.classify(&event) {
        Ok(classification) => classification,
        Err(e) => {
            error!(
                event = %event.event_name,
                user_id = %event.user_id,
                error = %e,
                "webhook payload did not match the expected shape, ignoring"
            );
            return;
        }
    };

    let deferred = matches!(classification, Classification::Deferred(_));
    let Some(tracking) = classification_event(classification, &event) else {
        return;
    };

    match publish_json(bus.as_ref(), topic, &tracking).await {
        Ok(()) => info!(
            user_id = %tracking.user_id,
            minutes = tracking.time_spent_minutes,
            deferred,
            "tracking event published"
        ),
        Err(e) => error!(
            user_id = %tracking.user_id,
            topic,
            error = %e,
            "failed to publish tracking event"
        ),
    }
}

fn classification_event(
    classification: Classification,
    event: &RawWebhookEvent,
) -> Option<tasktally_core::NormalizedTrackingEvent> {
    if let Classification::Ignored(reason) = &classification {
        debug!(
            event = %event.event_name,
            user_id = %event.user_id,
            %reason,
            "webhook ignored"
        );
    }
    classification.into_event()
}

/// GET /health
pub async fn get_health(State(state): State<WebhookState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}
