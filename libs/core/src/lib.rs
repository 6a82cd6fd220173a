//! Core types shared by the webhook event handler and the fan-out parsers.

pub mod envelope;
pub mod event;
pub mod subjects;

pub use envelope::*;
pub use event::*;
pub use subjects::*;
