//! Per-source extraction of [`CanonicalEvent`] records from fan-out
//! envelopes. One module per source; the set is closed at deployment time.

pub mod github;
pub mod redmine;

use std::collections::HashMap;

use hookrelay_core::{CanonicalEvent, MessageAttribute};
use thiserror::Error;

/// Result of running a normalizer over one notification.
#[derive(Debug)]
pub enum Outcome {
    Event(CanonicalEvent),
    /// The message is well-formed but does not qualify (most inbound
    /// issue-tracker records legitimately do not). Logged informationally
    /// by the caller, never an error.
    Skipped(String),
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unsupported {source_name} event type: '{event_type}'")]
    UnsupportedEventType {
        source_name: &'static str,
        event_type: String,
    },
    #[error("envelope attribute {0} is absent")]
    MissingAttribute(&'static str),
    #[error("payload is missing required field {0}")]
    MissingField(&'static str),
    #[error("field {field} holds an invalid timestamp: '{value}'")]
    BadTimestamp { field: &'static str, value: String },
    #[error("message body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Routes test traffic to a distinct logical partition: a `Mock` attribute
/// suffixes the source name (`github` -> `githubmock`).
pub fn source_name(base: &str, attributes: &HashMap<String, MessageAttribute>) -> String {
    if attributes.contains_key("Mock") {
        format!("{base}mock")
    } else {
        base.to_string()
    }
}

fn attr_str<'a>(
    attributes: &'a HashMap<String, MessageAttribute>,
    key: &'static str,
) -> Result<&'a str, NormalizeError> {
    attributes
        .get(key)
        .and_then(MessageAttribute::as_str)
        .ok_or(NormalizeError::MissingAttribute(key))
}
