use hookrelay_core::{Decoded, FanOutEnvelope};

/// Outcome of taking one raw delivery off the transport.
#[derive(Debug)]
pub enum Intake {
    /// Subscription confirmation handled in place; nothing to process.
    Confirmed,
    Notification(FanOutEnvelope),
    /// Malformed envelope, logged and dropped.
    Dropped,
}

/// Decodes a raw delivery body. The body is treated as JSON regardless of
/// the declared content-type (the broker pushes JSON as `text/plain`).
/// Control messages and malformed envelopes are resolved here so handlers
/// only ever see valid notifications.
pub fn intake(parser: &str, body: &[u8]) -> Intake {
    match FanOutEnvelope::decode(body) {
        Ok(Decoded::Confirmation { subscribe_url }) => {
            tracing::info!(
                parser,
                %subscribe_url,
                "open this link to confirm the subscription"
            );
            Intake::Confirmed
        }
        Ok(Decoded::Notification(envelope)) => Intake::Notification(envelope),
        Err(err) => {
            tracing::warn!(
                parser,
                error = %err,
                payload = %String::from_utf8_lossy(body),
                "malformed envelope dropped"
            );
            Intake::Dropped
        }
    }
}
