use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized event record produced by a parser and persisted by the store.
///
/// `(source, natural_id)` is the uniqueness key. An event only exists once
/// its delivery passed signature verification at ingress and envelope
/// validation at parsing; there is no other way to construct one in the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Originating system (`github`, `redmine`, ...), optionally suffixed
    /// with `mock` for test traffic.
    pub source: String,
    pub event_type: String,
    /// Source-defined identifier: a commit id, an issue id.
    pub natural_id: String,
    /// Original payload, kept verbatim as serialized JSON.
    pub metadata: String,
    pub time_created: DateTime<Utc>,
    /// Signature carried through from the inbound delivery for audit; a
    /// synthetic token when the source does not sign its payloads.
    pub signature: String,
    /// Fan-out message id of the delivery that produced this record.
    pub message_id: String,
}
