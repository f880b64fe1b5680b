// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment failures into miette diagnostics.
//!
//! Keys are reported with their table prefix (`tracking.ask_lables`). When
//! the TOML text that produced the error is available, unknown keys and
//! mistyped values are labelled in place; unknown keys also get a
//! Jaro-Winkler "did you mean" hint.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::fmt::Write as _;

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(tasktally::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path of the offending key.
        key: String,
        suggestion: Option<String>,
        /// Keys accepted by the enclosing table, comma separated.
        valid_keys: String,
        #[label("not a tasktally setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(tasktally::config::invalid_type), help("use a value of type {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("set here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(tasktally::config::missing_key),
        help("set `{key}` in tasktally.toml or through its TASKTALLY_ environment variable")
    )]
    MissingKey { key: String },

    /// Produced by [`crate::validation`] once the file deserialized.
    #[error("validation error: {message}")]
    #[diagnostic(code(tasktally::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(tasktally::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    let mut help = String::new();
    if let Some(s) = suggestion {
        let _ = write!(help, "did you mean `{s}`? ");
    }
    let _ = write!(help, "accepted here: {valid_keys}");
    help
}

type Labelled = (Option<SourceSpan>, Option<NamedSource<String>>);

/// One diagnostic per error carried by `err`.
///
/// `sources` pairs each TOML file name with its text, as read by the loader.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, sources))
        .collect()
}

fn convert(error: &figment::Error, sources: &[(String, String)]) -> ConfigError {
    match &error.kind {
        Kind::UnknownField(field, accepted) => {
            let table = table_name(&error.path);
            let (span, src) = label(error, sources, table.as_deref(), field);
            ConfigError::UnknownKey {
                key: dotted(table.as_deref(), field),
                suggestion: closest_key(field, accepted),
                valid_keys: accepted.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: dotted(table_name(&error.path).as_deref(), field),
        },
        Kind::InvalidType(actual, expected) => {
            let (span, src) = match error.path.split_last() {
                Some((leaf, parents)) => {
                    label(error, sources, table_name(parents).as_deref(), leaf)
                }
                None => (None, None),
            };
            ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

fn table_name(path: &[String]) -> Option<String> {
    (!path.is_empty()).then(|| path.join("."))
}

fn dotted(table: Option<&str>, key: &str) -> String {
    match table {
        Some(table) => format!("{table}.{key}"),
        None => key.to_string(),
    }
}

/// Labels `key` in the file the error came from. Inline strings carry no
/// file metadata, so a lone source is assumed to be the culprit.
fn label(
    error: &figment::Error,
    sources: &[(String, String)],
    table: Option<&str>,
    key: &str,
) -> Labelled {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    let source = match file {
        Some(file) => sources.iter().find(|(name, _)| *name == file),
        None if sources.len() == 1 => sources.first(),
        None => None,
    };

    source
        .and_then(|(name, text)| {
            let offset = key_offset(text, table, key)?;
            Some((
                Some(SourceSpan::new(offset.into(), key.len())),
                Some(NamedSource::new(name, text.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `key = ...` inside `[table]`, or in the root table when
/// `table` is `None`.
pub fn key_offset(text: &str, table: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        let start = line_start;
        line_start += line.len();

        let body = line.trim_start();
        if let Some(header) = body.strip_prefix('[') {
            current = header.split(']').next().map(str::trim);
            continue;
        }
        if current != table {
            continue;
        }
        if let Some(rest) = body.strip_prefix(key) {
            if rest.trim_start().starts_with('=') {
                return Some(start + line.len() - body.len());
            }
        }
    }
    None
}

/// The accepted key most similar to `unknown`, if any is close enough.
pub fn closest_key(unknown: &str, accepted: &[&str]) -> Option<String> {
    accepted
        .iter()
        .map(|candidate| (strsim::jaro_winkler(unknown, candidate), *candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Writes every error to stderr in one block.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        let mark = out.len();
        if handler.render_report(&mut out, error as &dyn Diagnostic).is_err() {
            out.truncate(mark);
            let _ = writeln!(out, "error: {error}");
        }
    }
    eprint!("{out}");
}
