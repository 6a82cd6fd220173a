use std::net::SocketAddr;

use anyhow::{Context, Result};
use hookrelay_store::DuplicatePolicy;

/// Listen address from the environment. `BIND` wins; `PORT` is the original
/// deployment convention, defaulting to 8080.
pub fn bind_addr() -> Result<SocketAddr> {
    let addr = match std::env::var("BIND") {
        Ok(bind) => bind,
        Err(_) => format!(
            "0.0.0.0:{}",
            std::env::var("PORT").unwrap_or_else(|_| "8080".into())
        ),
    };
    addr.parse().with_context(|| format!("invalid bind address '{addr}'"))
}

/// Duplicate policy knob: `DUPLICATE_POLICY` overrides the parser's
/// per-source default.
pub fn duplicate_policy(default: DuplicatePolicy) -> Result<DuplicatePolicy> {
    match std::env::var("DUPLICATE_POLICY") {
        Ok(raw) => raw.parse().map_err(anyhow::Error::msg),
        Err(_) => Ok(default),
    }
}

/// Store path from the environment (`DB_PATH`, defaulting to `events.db`).
pub fn db_path() -> String {
    std::env::var("DB_PATH").unwrap_or_else(|_| "events.db".into())
}
