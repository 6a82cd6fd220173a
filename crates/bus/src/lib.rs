//! Fan-out channel client: a publish trait with a NATS implementation for
//! deployments and an in-memory implementation for tests.
//!
//! The transport is an at-least-once channel with opaque envelopes; callers
//! make exactly one publish attempt per accepted event and treat failures
//! as terminal.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("publish to {subject} failed: {source}")]
    Publish {
        subject: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BusError {
    fn publish(subject: &str, source: impl Into<anyhow::Error>) -> Self {
        Self::Publish {
            subject: subject.to_string(),
            source: source.into(),
        }
    }
}

#[async_trait]
pub trait BusClient: Send + Sync {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError>;
}

pub struct NatsBusClient {
    client: async_nats::Client,
}

impl NatsBusClient {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BusClient for NatsBusClient {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError> {
        let bytes = serde_json::to_vec(&payload).map_err(|err| BusError::publish(subject, err))?;
        self.client
            .publish(subject.to_string(), bytes.into())
            .await
            .map_err(|err| BusError::publish(subject, err))
    }
}

/// Captures published values for inspection in tests.
#[derive(Clone, Default)]
pub struct InMemoryBusClient {
    published: Arc<Mutex<Vec<(String, Value)>>>,
}

impl InMemoryBusClient {
    pub async fn take_published(&self) -> Vec<(String, Value)> {
        let mut guard = self.published.lock().await;
        std::mem::take(&mut *guard)
    }
}

#[async_trait]
impl BusClient for InMemoryBusClient {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError> {
        let mut guard = self.published.lock().await;
        guard.push((subject.to_string(), payload));
        Ok(())
    }
}
