//! Github push events: commit id and timestamp from `head_commit`, signature
//! carried through from the delivery headers for the audit trail.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hookrelay_core::{CanonicalEvent, MessageAttribute};
use serde_json::Value;

use crate::{NormalizeError, Outcome, attr_str, source_name};

/// Event types we know how to normalize. Anything else is rejected, not
/// silently mapped.
const SUPPORTED_EVENTS: &[&str] = &["push"];

pub fn extract(
    attributes: &HashMap<String, MessageAttribute>,
    message: &str,
    message_id: &str,
) -> Result<Outcome, NormalizeError> {
    let event_type = attr_str(attributes, "X-Github-Event")?;
    if !SUPPORTED_EVENTS.contains(&event_type) {
        return Err(NormalizeError::UnsupportedEventType {
            source_name: "github",
            event_type: event_type.to_string(),
        });
    }
    let signature = attr_str(attributes, "X-Hub-Signature")?.to_string();

    let metadata: Value = serde_json::from_str(message)?;
    let head_commit = metadata
        .get("head_commit")
        .filter(|v| !v.is_null())
        .ok_or(NormalizeError::MissingField("head_commit"))?;
    let natural_id = head_commit
        .get("id")
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingField("head_commit.id"))?
        .to_string();
    let stamp = head_commit
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingField("head_commit.timestamp"))?;
    let time_created = DateTime::parse_from_rfc3339(stamp)
        .map_err(|_| NormalizeError::BadTimestamp {
            field: "head_commit.timestamp",
            value: stamp.to_string(),
        })?
        .with_timezone(&Utc);

    Ok(Outcome::Event(CanonicalEvent {
        source: source_name("github", attributes),
        event_type: event_type.to_string(),
        natural_id,
        metadata: metadata.to_string(),
        time_created,
        signature,
        message_id: message_id.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attrs(event_type: &str) -> HashMap<String, MessageAttribute> {
        HashMap::from([
            (
                "X-Github-Event".to_string(),
                MessageAttribute::string(event_type),
            ),
            (
                "X-Hub-Signature".to_string(),
                MessageAttribute::string("sha1=deadbeef"),
            ),
        ])
    }

    const PUSH_BODY: &str =
        r#"{"head_commit":{"id":"c1","timestamp":"2020-01-01T00:00:00+00:00"}}"#;

    #[test]
    fn extracts_push_event() {
        let outcome = extract(&attrs("push"), PUSH_BODY, "m-1").unwrap();
        let Outcome::Event(event) = outcome else {
            panic!("expected event");
        };
        assert_eq!(event.source, "github");
        assert_eq!(event.event_type, "push");
        assert_eq!(event.natural_id, "c1");
        assert_eq!(
            event.time_created,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(event.signature, "sha1=deadbeef");
        assert_eq!(event.message_id, "m-1");
    }

    #[test]
    fn normalizes_timestamp_to_utc() {
        let body = r#"{"head_commit":{"id":"c2","timestamp":"2020-01-01T02:00:00+02:00"}}"#;
        let Outcome::Event(event) = extract(&attrs("push"), body, "m-2").unwrap() else {
            panic!("expected event");
        };
        assert_eq!(
            event.time_created,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn mock_attribute_repartitions_source() {
        let mut attributes = attrs("push");
        attributes.insert("Mock".to_string(), MessageAttribute::string("1"));
        let Outcome::Event(event) = extract(&attributes, PUSH_BODY, "m-3").unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.source, "githubmock");
    }

    #[test]
    fn rejects_unsupported_event_type() {
        let err = extract(&attrs("issues"), PUSH_BODY, "m-4").unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::UnsupportedEventType { event_type, .. } if event_type == "issues"
        ));
    }

    #[test]
    fn rejects_missing_head_commit() {
        let err = extract(&attrs("push"), r#"{"ref":"refs/heads/main"}"#, "m-5").unwrap_err();
        assert!(matches!(err, NormalizeError::MissingField("head_commit")));
    }

    #[test]
    fn fails_closed_on_bad_timestamp() {
        let body = r#"{"head_commit":{"id":"c1","timestamp":"yesterday"}}"#;
        let err = extract(&attrs("push"), body, "m-6").unwrap_err();
        assert!(matches!(err, NormalizeError::BadTimestamp { .. }));
    }

    #[test]
    fn rejects_missing_event_type_attribute() {
        let attributes = HashMap::from([(
            "X-Hub-Signature".to_string(),
            MessageAttribute::string("sha1=deadbeef"),
        )]);
        let err = extract(&attributes, PUSH_BODY, "m-7").unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MissingAttribute("X-Github-Event")
        ));
    }
}
