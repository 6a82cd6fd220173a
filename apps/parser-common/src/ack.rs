use http::StatusCode;

/// The acknowledgement policy applied once a message has been accepted from
/// the broker: every delivery is acked with `204 No Content`, including
/// decode, normalization, and persistence failures, which are logged and
/// dropped. The broker's at-least-once redelivery is deliberately not
/// leveraged; this trades durability for freedom from redelivery storms and
/// makes the pipeline at-most-effectively-once past this point.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAck;

impl AlwaysAck {
    pub fn acknowledge(&self) -> StatusCode {
        StatusCode::NO_CONTENT
    }
}
