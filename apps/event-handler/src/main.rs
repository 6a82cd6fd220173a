//! Webhook event handler: authenticates inbound webhook deliveries per
//! source and republishes verified events onto the fan-out channel, one
//! topic per source.
//!
//! Authorization and signature failures surface to the origin caller;
//! anything after the event is accepted (including a publish failure) is
//! logged and suppressed so origins do not retry-storm the handler.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hookrelay_bus::{BusClient, NatsBusClient};
use hookrelay_core::{FanOutEnvelope, MessageAttribute, fanout_subject};
use hookrelay_sources::{SourceRegistry, VerifyError};
use tracing_subscriber::EnvFilter;

mod reqid;

#[derive(Clone)]
struct AppState {
    bus: Arc<dyn BusClient>,
    registry: Arc<SourceRegistry>,
    project: String,
    auth_secret: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let project = std::env::var("PROJECT_NAME").unwrap_or_else(|_| "hookrelay".into());
    let auth_secret = std::env::var("AUTH_SECRET").context("AUTH_SECRET is required")?;
    let nats_url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
    let nats = async_nats::connect(nats_url).await?;

    let app = router(AppState {
        bus: Arc::new(NatsBusClient::new(nats)),
        registry: Arc::new(SourceRegistry::authorized()),
        project,
        auth_secret,
    });

    let addr: std::net::SocketAddr = match std::env::var("BIND") {
        Ok(bind) => bind,
        Err(_) => format!(
            "0.0.0.0:{}",
            std::env::var("PORT").unwrap_or_else(|_| "8080".into())
        ),
    }
    .parse()
    .context("invalid bind address")?;
    tracing::info!("event-handler listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/event-handler", get(handle_event).post(handle_event))
        .route("/health", get(health))
        .layer(middleware::from_fn(reqid::with_request_id))
        .with_state(state)
}

async fn health() -> &'static str {
    "healthy"
}

/// Rejections that happen before any data leaves the process. Everything
/// later is logged, not surfaced.
#[derive(Debug)]
enum DispatchError {
    SourceNotAuthorized(String),
    Unverified(VerifyError),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        match self {
            Self::SourceNotAuthorized(source) => {
                tracing::warn!(%source, "source not authorized");
                (StatusCode::FORBIDDEN, "source not authorized").into_response()
            }
            Self::Unverified(err) => {
                tracing::warn!(error = %err, "unverified signature");
                (StatusCode::UNAUTHORIZED, "unverified signature").into_response()
            }
        }
    }
}

async fn handle_event(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, DispatchError> {
    let source = state
        .registry
        .identify(&headers)
        .ok_or_else(|| DispatchError::SourceNotAuthorized("<unidentified>".into()))?;
    let descriptor = state
        .registry
        .lookup(&source)
        .ok_or_else(|| DispatchError::SourceNotAuthorized(source.clone()))?;

    let candidate = descriptor.candidate(&headers, &query);
    descriptor
        .strategy
        .verify(&state.auth_secret, candidate.as_deref(), &body)
        .map_err(DispatchError::Unverified)?;

    let attributes = outbound_attributes(&headers);
    let envelope =
        FanOutEnvelope::notification(String::from_utf8_lossy(&body).into_owned(), attributes);
    let subject = fanout_subject(&state.project, &source);

    // Exactly one publish attempt per accepted request. A broker failure is
    // logged and the origin still gets its 204, so the event is lost unless
    // the broker retries on its side.
    match state.bus.publish_value(&subject, envelope.to_value()).await {
        Ok(()) => {
            tracing::info!(%subject, message_id = %envelope.message_id, "event dispatched");
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                %subject,
                message_id = %envelope.message_id,
                payload = %envelope.message,
                "publish failed, event dropped"
            );
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Outbound attribute set: every request header except `Authorization`,
/// which must never leave the process. Header names are restored to their
/// canonical wire casing so parsers can look them up verbatim.
fn outbound_attributes(headers: &HeaderMap) -> HashMap<String, MessageAttribute> {
    let mut attributes = HashMap::new();
    for (name, value) in headers {
        if name == header::AUTHORIZATION {
            continue;
        }
        let attribute = match value.to_str() {
            Ok(text) => MessageAttribute::string(text),
            Err(_) => MessageAttribute::Binary {
                value: B64.encode(value.as_bytes()),
            },
        };
        attributes.insert(canonical_header_name(name.as_str()), attribute);
    }
    attributes
}

/// `x-github-event` -> `X-Github-Event`, matching how sources spell their
/// headers on the wire before HTTP/1 lowercasing.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
