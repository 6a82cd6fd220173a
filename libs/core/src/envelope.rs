//! Fan-out transport envelope (SNS-shaped JSON).
//!
//! The event handler wraps each verified webhook body in a `Notification`
//! envelope; parsers receive the envelope over a push subscription and unwrap
//! it with [`FanOutEnvelope::decode`]. `SubscriptionConfirmation` is a
//! one-time control message carrying the URL an operator must visit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope is missing the Message field")]
    MissingMessage,
    #[error("envelope is missing the MessageId field")]
    MissingMessageId,
    #[error("envelope is missing the MessageAttributes map")]
    MissingAttributes,
    #[error("confirmation envelope is missing the SubscribeURL field")]
    MissingSubscribeUrl,
}

/// Attribute value mirrored from an original request header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "DataType")]
pub enum MessageAttribute {
    String {
        #[serde(rename = "StringValue")]
        value: String,
    },
    /// Base64 of a header value that was not valid UTF-8.
    Binary {
        #[serde(rename = "BinaryValue")]
        value: String,
    },
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String { value } => Some(value),
            Self::Binary { .. } => None,
        }
    }
}

/// A validated `Notification` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutEnvelope {
    /// De-duplication anchor assigned at publish time.
    pub message_id: String,
    /// Verbatim original request body.
    pub message: String,
    /// Original request headers, minus anything stripped at ingress.
    pub attributes: HashMap<String, MessageAttribute>,
}

/// Outcome of decoding a raw transport message.
#[derive(Debug)]
pub enum Decoded {
    /// Control message; the caller surfaces the URL and stops.
    Confirmation { subscribe_url: String },
    Notification(FanOutEnvelope),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "Type")]
    envelope_type: String,
    #[serde(rename = "MessageId", default)]
    message_id: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "MessageAttributes", default)]
    attributes: Option<HashMap<String, MessageAttribute>>,
    #[serde(rename = "SubscribeURL", default)]
    subscribe_url: Option<String>,
}

impl FanOutEnvelope {
    /// Builds a `Notification` envelope with a fresh message id.
    pub fn notification(
        message: String,
        attributes: HashMap<String, MessageAttribute>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            message,
            attributes,
        }
    }

    /// Wire form published onto the fan-out channel.
    pub fn to_value(&self) -> Value {
        json!({
            "Type": "Notification",
            "MessageId": self.message_id,
            "Message": self.message,
            "MessageAttributes": self.attributes,
        })
    }

    /// Validates and unwraps a raw transport message.
    ///
    /// Anything other than a well-formed envelope is an error; the broker
    /// redelivers at-least-once, so callers log and drop rather than retry.
    pub fn decode(raw: &[u8]) -> Result<Decoded, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_slice(raw)?;
        if raw.envelope_type == "SubscriptionConfirmation" {
            let subscribe_url = raw
                .subscribe_url
                .ok_or(EnvelopeError::MissingSubscribeUrl)?;
            return Ok(Decoded::Confirmation { subscribe_url });
        }
        let message = raw.message.ok_or(EnvelopeError::MissingMessage)?;
        let message_id = raw.message_id.ok_or(EnvelopeError::MissingMessageId)?;
        let attributes = raw.attributes.ok_or(EnvelopeError::MissingAttributes)?;
        Ok(Decoded::Notification(FanOutEnvelope {
            message_id,
            message,
            attributes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification_json() -> Value {
        json!({
            "Type": "Notification",
            "MessageId": "m-1",
            "Message": "{\"ok\":true}",
            "MessageAttributes": {
                "User-Agent": { "DataType": "String", "StringValue": "GitHub-Hookshot/abc" }
            }
        })
    }

    #[test]
    fn decode_unwraps_notification() {
        let raw = serde_json::to_vec(&notification_json()).unwrap();
        let Decoded::Notification(env) = FanOutEnvelope::decode(&raw).unwrap() else {
            panic!("expected notification");
        };
        assert_eq!(env.message_id, "m-1");
        assert_eq!(env.message, "{\"ok\":true}");
        assert_eq!(
            env.attributes["User-Agent"].as_str(),
            Some("GitHub-Hookshot/abc")
        );
    }

    #[test]
    fn decode_short_circuits_confirmation() {
        let raw = serde_json::to_vec(&json!({
            "Type": "SubscriptionConfirmation",
            "SubscribeURL": "https://broker.example/confirm?token=t"
        }))
        .unwrap();
        let Decoded::Confirmation { subscribe_url } = FanOutEnvelope::decode(&raw).unwrap() else {
            panic!("expected confirmation");
        };
        assert_eq!(subscribe_url, "https://broker.example/confirm?token=t");
    }

    #[test]
    fn decode_rejects_missing_message() {
        let mut value = notification_json();
        value.as_object_mut().unwrap().remove("Message");
        let raw = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            FanOutEnvelope::decode(&raw),
            Err(EnvelopeError::MissingMessage)
        ));
    }

    #[test]
    fn decode_rejects_missing_attributes() {
        let mut value = notification_json();
        value.as_object_mut().unwrap().remove("MessageAttributes");
        let raw = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            FanOutEnvelope::decode(&raw),
            Err(EnvelopeError::MissingAttributes)
        ));
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(
            FanOutEnvelope::decode(b"not json"),
            Err(EnvelopeError::Json(_))
        ));
    }

    #[test]
    fn wire_form_round_trips() {
        let env = FanOutEnvelope::notification(
            "{}".into(),
            HashMap::from([("Mock".to_string(), MessageAttribute::string("1"))]),
        );
        let raw = serde_json::to_vec(&env.to_value()).unwrap();
        let Decoded::Notification(decoded) = FanOutEnvelope::decode(&raw).unwrap() else {
            panic!("expected notification");
        };
        assert_eq!(decoded, env);
    }
}
