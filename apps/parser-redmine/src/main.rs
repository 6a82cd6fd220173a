//! Redmine parser: receives fan-out notifications pushed over HTTP, keeps
//! incident issues whose description names a root cause, and stores them
//! idempotently. Replays refresh the metadata so a revised description is
//! picked up. Deliveries are always acked; see `AlwaysAck`.

use anyhow::Result;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use hookrelay_normalize::{Outcome, redmine};
use hookrelay_parser_common::{
    AlwaysAck, Intake, bind_addr, db_path, duplicate_policy, health, intake, persist,
};
use hookrelay_store::{DuplicatePolicy, EventStore};
use tracing_subscriber::EnvFilter;

const PARSER: &str = "redmine-parser";

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
    let policy = duplicate_policy(DuplicatePolicy::ReplaceMetadata)?;
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
        .route("/redmine-parser", post(handle_message))
        .route("/health", get(health))
        .with_state(state)
}

async fn handle_message(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let envelope = match intake(PARSER, &body) {
        Intake::Notification(envelope) => envelope,
        Intake::Confirmed | Intake::Dropped => return state.ack.acknowledge(),
    };

    match redmine::extract(&envelope.attributes, &envelope.message, &envelope.message_id) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            store: EventStore::open_in_memory().unwrap(),
            policy: DuplicatePolicy::ReplaceMetadata,
            ack: AlwaysAck,
        }
    }

    fn issue_envelope(message_id: &str, description: &str) -> String {
        let message = json!({
            "payload": {
                "issue": {
                    "id": 4711,
                    "tracker": { "name": "Incident" },
                    "description": description,
                    "created_on": "2020-03-05T12:30:45.123Z"
                }
            }
        })
        .to_string();
        json!({
            "Type": "Notification",
            "MessageId": message_id,
            "Message": message,
            "MessageAttributes": {
                "User-Agent": { "DataType": "String", "StringValue": "Faraday v1.0" }
            }
        })
        .to_string()
    }

    async fn post(state: &AppState, body: String) -> StatusCode {
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/redmine-parser")
                    .header("content-type", "text/plain")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn stores_qualifying_incident() {
        let state = test_state();
        assert_eq!(
            post(&state, issue_envelope("m-1", "root cause: overload")).await,
            StatusCode::NO_CONTENT
        );
        let row = state.store.fetch("redmine", "4711").unwrap().unwrap();
        assert_eq!(row.event_type, "incident");
        let metadata: serde_json::Value = serde_json::from_str(&row.metadata).unwrap();
        assert_eq!(metadata["root_cause"], "overload");
    }

    #[tokio::test]
    async fn replay_refreshes_metadata_only() {
        let state = test_state();
        post(&state, issue_envelope("m-1", "root cause: overload")).await;
        post(&state, issue_envelope("m-2", "root cause: dns")).await;

        assert_eq!(state.store.count().unwrap(), 1);
        let row = state.store.fetch("redmine", "4711").unwrap().unwrap();
        let metadata: serde_json::Value = serde_json::from_str(&row.metadata).unwrap();
        assert_eq!(metadata["root_cause"], "dns");
        // everything but metadata keeps the first write
        assert_eq!(row.message_id, "m-1");
    }

    #[tokio::test]
    async fn missing_root_cause_is_skipped_silently() {
        let state = test_state();
        assert_eq!(
            post(&state, issue_envelope("m-1", "Still investigating.")).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(state.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn non_incident_tracker_is_skipped_silently() {
        let state = test_state();
        let message = json!({
            "payload": {
                "issue": {
                    "id": 4711,
                    "tracker": { "name": "Feature" },
                    "description": "root cause: n/a",
                    "created_on": "2020-03-05T12:30:45.123Z"
                }
            }
        })
        .to_string();
        let body = json!({
            "Type": "Notification",
            "MessageId": "m-1",
            "Message": message,
            "MessageAttributes": {}
        })
        .to_string();
        assert_eq!(post(&state, body).await, StatusCode::NO_CONTENT);
        assert_eq!(state.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn subscription_confirmation_stores_nothing() {
        let state = test_state();
        let body = json!({
            "Type": "SubscriptionConfirmation",
            "SubscribeURL": "https://broker.example/confirm"
        })
        .to_string();
        assert_eq!(post(&state, body).await, StatusCode::NO_CONTENT);
        assert_eq!(state.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn bad_timestamp_is_logged_and_acked() {
        let state = test_state();
        let message = json!({
            "payload": {
                "issue": {
                    "id": 4711,
                    "tracker": { "name": "Incident" },
                    "description": "root cause: overload",
                    "created_on": "05/03/2020"
                }
            }
        })
        .to_string();
        let body = json!({
            "Type": "Notification",
            "MessageId": "m-1",
            "Message": message,
            "MessageAttributes": {}
        })
        .to_string();
        assert_eq!(post(&state, body).await, StatusCode::NO_CONTENT);
        assert_eq!(state.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        use http_body_util::BodyExt;

        let response = router(test_state())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"healthy");
    }
}
