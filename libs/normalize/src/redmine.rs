//! Redmine issue events. Two content gates decide whether a record
//! qualifies: the tracker must be an incident tracker, and the description
//! must name a root cause. Records failing either gate are skipped, not
//! rejected; most inbound issues legitimately do not qualify.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use hookrelay_core::{CanonicalEvent, MessageAttribute};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::{NormalizeError, Outcome, source_name};

const TRACKER_GATE: &str = "Incident";
/// Strict issue timestamp format; a mismatch fails closed rather than
/// defaulting.
const CREATED_ON_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

static ROOT_CAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"root cause: (\w*)").expect("valid root-cause pattern"));

pub fn extract(
    attributes: &HashMap<String, MessageAttribute>,
    message: &str,
    message_id: &str,
) -> Result<Outcome, NormalizeError> {
    let body: Value = serde_json::from_str(message)?;
    let mut metadata = body
        .get("payload")
        .cloned()
        .ok_or(NormalizeError::MissingField("payload"))?;

    let (natural_id, tracker_name, description, created_on) = {
        let issue = metadata
            .get("issue")
            .ok_or(NormalizeError::MissingField("issue"))?;
        let natural_id = issue
            .get("id")
            .and_then(value_as_id)
            .ok_or(NormalizeError::MissingField("issue.id"))?;
        let tracker_name = issue
            .get("tracker")
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .ok_or(NormalizeError::MissingField("issue.tracker.name"))?
            .to_string();
        let description = issue
            .get("description")
            .and_then(Value::as_str)
            .ok_or(NormalizeError::MissingField("issue.description"))?
            .to_string();
        let created_on = issue
            .get("created_on")
            .and_then(Value::as_str)
            .ok_or(NormalizeError::MissingField("issue.created_on"))?
            .to_string();
        (natural_id, tracker_name, description, created_on)
    };

    if !tracker_name.contains(TRACKER_GATE) {
        return Ok(Outcome::Skipped(format!("{natural_id}: not an incident")));
    }
    let lowered = description.to_lowercase();
    let root_cause = match ROOT_CAUSE.captures(&lowered) {
        Some(caps) => caps[1].to_string(),
        None => {
            return Ok(Outcome::Skipped(format!(
                "{natural_id}: root cause is missing"
            )));
        }
    };

    let time_created = NaiveDateTime::parse_from_str(&created_on, CREATED_ON_FORMAT)
        .map_err(|_| NormalizeError::BadTimestamp {
            field: "issue.created_on",
            value: created_on.clone(),
        })?
        .and_utc();

    metadata["root_cause"] = Value::String(root_cause);

    Ok(Outcome::Event(CanonicalEvent {
        source: source_name("redmine", attributes),
        event_type: "incident".to_string(),
        natural_id,
        metadata: metadata.to_string(),
        time_created,
        // Redmine does not sign its payloads; a random token fills the
        // audit column.
        signature: Uuid::new_v4().simple().to_string(),
        message_id: message_id.to_string(),
    }))
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
