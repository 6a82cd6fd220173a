//! Shared plumbing for the fan-out parsers: envelope intake, the
//! acknowledgement policy, persistence logging, and env configuration.

pub mod ack;
pub mod config;
pub mod intake;

pub use ack::*;
pub use config::*;
pub use intake::*;

use hookrelay_core::CanonicalEvent;
use hookrelay_store::{DuplicatePolicy, EventStore};

/// Health-check body shared by all parser endpoints.
pub async fn health() -> &'static str {
    "healthy"
}

/// Writes one normalized event, logging the outcome. Persistence failures
/// are non-fatal by design; the caller still acks the broker.
pub fn persist(store: &EventStore, policy: DuplicatePolicy, event: &CanonicalEvent) {
    match store.upsert(event, policy) {
        Ok(rows) => tracing::info!(
            rows,
            source = %event.source,
            natural_id = %event.natural_id,
            message_id = %event.message_id,
            "event stored"
        ),
        Err(err) => tracing::warn!(
            error = %err,
            source = %event.source,
            natural_id = %event.natural_id,
            message_id = %event.message_id,
            payload = %event.metadata,
            "event not saved"
        ),
    }
}
