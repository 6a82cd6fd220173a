//! Source authentication: which system sent a webhook, and does its
//! signature check out.

pub mod registry;
pub mod verify;

pub use registry::*;
pub use verify::*;
