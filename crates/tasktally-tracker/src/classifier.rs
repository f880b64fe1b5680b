// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event classification.
//!
//! A webhook is decoded in two steps: the envelope first, then `event_data`
//! according to `event_name`. Only the completion event has a known payload
//! shape; everything else stays raw and is ignored.

use serde::{Deserialize, Deserializer};
use strum::Display;
use tasktally_core::{NormalizedTrackingEvent, TasktallyError};
use thiserror::Error;
use tracing::warn;

use crate::duration::{decode_label_duration, decode_structured_duration};

/// Errors raised while decoding a webhook.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The body is not JSON or lacks a required envelope field. The caller
    /// should reject the delivery.
    #[error("malformed webhook: {0}")]
    Malformed(String),

    /// A completion event whose `event_data` does not have the task shape.
    #[error("schema drift in `{event}` payload: {reason}")]
    SchemaDrift { event: String, reason: String },
}

impl From<ClassifyError> for TasktallyError {
    fn from(err: ClassifyError) -> Self {
        TasktallyError::Decode {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// A webhook delivery as sent by the task tracker.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWebhookEvent {
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub event_data: serde_json::Value,
    #[serde(default)]
    pub triggered_at: Option<String>,
}

impl RawWebhookEvent {
    /// Structural decode of a request body. Requires `event_name` and `user_id`.
    pub fn parse(body: &[u8]) -> Result<Self, ClassifyError> {
        let event: RawWebhookEvent = serde_json::from_slice(body)
            .map_err(|e| ClassifyError::Malformed(format!("invalid JSON payload: {e}")))?;

        let missing: Vec<&str> = [
            ("event_name", event.event_name.is_empty()),
            ("user_id", event.user_id.is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect();

        if !missing.is_empty() {
            return Err(ClassifyError::Malformed(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(event)
    }

    /// Decodes `event_data` according to the event name.
    pub fn payload(&self, completion_event: &str) -> Result<EventPayload, ClassifyError> {
        if self.event_name != completion_event {
            return Ok(EventPayload::Other(self.event_data.clone()));
        }
        let task = TaskCompletionDescriptor::deserialize(&self.event_data).map_err(|e| {
            ClassifyError::SchemaDrift {
                event: self.event_name.clone(),
                reason: e.to_string(),
            }
        })?;
        if task.content.trim().is_empty() {
            return Err(ClassifyError::SchemaDrift {
                event: self.event_name.clone(),
                reason: "task content is empty".to_string(),
            });
        }
        Ok(EventPayload::Completion(task))
    }
}

/// `event_data` decoded by event name.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Completion(TaskCompletionDescriptor),
    Other(serde_json::Value),
}

/// The task a completion event refers to.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCompletionDescriptor {
    #[serde(default)]
    pub id: String,
    /// Task title.
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub duration: Option<TaskDuration>,
}

/// Structured duration attached to a task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDuration {
    pub amount: i64,
    pub unit: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why an event produced nothing to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IgnoreReason {
    NotCompletion,
    NoLabels,
    NoTrackingLabel,
}

/// Result of classifying one webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ignored(IgnoreReason),
    /// Duration known; store directly.
    Immediate(NormalizedTrackingEvent),
    /// Duration must be asked for.
    Deferred(NormalizedTrackingEvent),
}

impl Classification {
    /// The event to publish, if any.
    pub fn into_event(self) -> Option<NormalizedTrackingEvent> {
        match self {
            Classification::Ignored(_) => None,
            Classification::Immediate(event) | Classification::Deferred(event) => Some(event),
        }
    }
}

/// Tokens the classifier matches against.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Event name of a completed task.
    pub completion_event: String,
    /// Labels that defer the duration to the user.
    pub ask_labels: Vec<String>,
    /// Prefixes of `HHMM` duration labels.
    pub log_label_prefixes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            completion_event: "item:completed".to_string(),
            ask_labels: vec!["track".to_string(), "@track".to_string()],
            log_label_prefixes: vec!["log".to_string(), "@log".to_string()],
        }
    }
}

/// Decides what, if anything, a webhook means for time tracking.
///
/// Priority: a structured duration wins over labels; otherwise labels are
/// scanned in order and the first ask label or duration label decides.
#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    config: ClassifierConfig,
}

impl EventClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies a structurally valid webhook.
    ///
    /// Returns [`ClassifyError::SchemaDrift`] when a completion event carries
    /// an unexpected payload.
    pub fn classify(&self, event: &RawWebhookEvent) -> Result<Classification, ClassifyError> {
        let task = match event.payload(&self.config.completion_event)? {
            EventPayload::Completion(task) => task,
            EventPayload::Other(_) => return Ok(Classification::Ignored(IgnoreReason::NotCompletion)),
        };

        if let Some(duration) = &task.duration {
            let minutes = decode_structured_duration(duration.amount, &duration.unit)
                .unwrap_or_else(|| {
                    warn!(
                        unit = %duration.unit,
                        task_id = %task.id,
                        "unknown duration unit, recording 0 minutes"
                    );
                    0
                });
            return Ok(Classification::Immediate(NormalizedTrackingEvent::immediate(
                &event.user_id,
                task.content,
                minutes,
            )));
        }

        if task.labels.is_empty() {
            return Ok(Classification::Ignored(IgnoreReason::NoLabels));
        }

        for label in &task.labels {
            if self.config.ask_labels.iter().any(|ask| ask == label) {
                return Ok(Classification::Deferred(NormalizedTrackingEvent::deferred(
                    &event.user_id,
                    task.content,
                )));
            }
            if let Some(minutes) = decode_label_duration(label, &self.config.log_label_prefixes) {
                return Ok(Classification::Immediate(NormalizedTrackingEvent::immediate(
                    &event.user_id,
                    task.content,
                    minutes,
                )));
            }
        }

        Ok(Classification::Ignored(IgnoreReason::NoTrackingLabel))
    }
}
