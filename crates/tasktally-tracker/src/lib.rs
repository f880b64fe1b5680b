// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns task-tracker webhooks into normalized tracking events.
//!
//! Pure logic with no I/O: the [`duration`] codec decodes `HHMM` digit
//! groups and structured durations, and the [`classifier`] decides whether a
//! webhook is stored immediately, deferred to the user, or ignored.

pub mod classifier;
pub mod duration;

pub use classifier::{
    Classification, ClassifierConfig, ClassifyError, EventClassifier, EventPayload, IgnoreReason,
    RawWebhookEvent, TaskCompletionDescriptor, TaskDuration,
};
pub use duration::{
    DurationUnit, decode_free_text_duration, decode_label_duration, decode_structured_duration,
    format_minutes,
};
