//! Github parser: receives fan-out notifications pushed over HTTP, extracts
//! push events into canonical records, and stores them idempotently.
//! Deliveries are always acked; see `AlwaysAck` for the tradeoff.

use anyhow::Result;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use hookrelay_normalize::{Outcome, github};
use hookrelay_parser_common::{
    AlwaysAck, Intake, bind_addr, db_path, duplicate_policy, health, intake, persist,
};
use hookrelay_store::{DuplicatePolicy, EventStore};
use tracing_subscriber::EnvFilter;

const PARSER: &str = "github-parser";

#[derive(Clone)]
struct AppState {
    store: EventStore,
    policy: DuplicatePolicy,
    ack: AlwaysAck,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = EventStore::open(db_path())?;
    let policy = duplicate_policy(DuplicatePolicy::InsertOnly)?;
    let app = router(AppState {
        store,
        policy,
        ack: AlwaysAck,
    });

    let addr = bind_addr()?;
    tracing::info!("{PARSER} listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/github-parser", post(handle_message))
        .route("/health", get(health))
        .with_state(state)
}

async fn handle_message(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let envelope = match intake(PARSER, &body) {
        Intake::Notification(envelope) => envelope,
        Intake::Confirmed | Intake::Dropped => return state.ack.acknowledge(),
    };

    match github::extract(&envelope.attributes, &envelope.message, &envelope.message_id) {
        Ok(Outcome::Event(event)) => persist(&state.store, state.policy, &event),
        Ok(Outcome::Skipped(reason)) => {
            tracing::info!(message_id = %envelope.message_id, %reason, "event skipped");
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                message_id = %envelope.message_id,
                payload = %envelope.message,
                "event not saved"
            );
        }
    }
    state.ack.acknowledge()
}
