//! HTTP handlers mapping requests onto the relay.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::server::AppState;

/// `GET /events`: open a subscription and stream its frames as SSE
/// `data:` messages. The stream ends when the client goes away or the
/// relay drops the subscriber. Refused with 503 during shutdown.
pub async fn events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let subscription = state.relay.subscribe().map_err(|e| {
        debug!(kind = e.error_kind(), "subscription refused");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;
    let stream = subscription.map(|frame| Ok::<_, Infallible>(Event::default().data(frame)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

/// `GET /state`: the current document, or `null`.
pub async fn state(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.relay.snapshot();
    Json(json!({ "state": snapshot.document.as_deref() }))
}

/// `POST /patch`: replace the document with the body's `state` field.
pub async fn patch(State(state): State<AppState>, body: Bytes) -> Response {
    let relay = Arc::clone(&state.relay);
    // Persistence does blocking file I/O.
    match tokio::task::spawn_blocking(move || relay.apply_update(&body)).await {
        Ok(Ok(ack)) => {
            debug!(revision = ack.revision, delivered = ack.delivered, "update accepted");
            Json(json!({ "ok": true })).into_response()
        }
        Ok(Err(e)) => {
            debug!(kind = e.error_kind(), error = %e, "update rejected");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "update task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /health`: liveness plus relay counters.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.relay.snapshot();
    Json(json!({
        "status": "healthy",
        "subscribers": state.relay.registry().count(),
        "revision": snapshot.revision,
        "has_state": snapshot.document.is_some(),
        "started_at": state.started_at.to_rfc3339(),
        "stats": state.relay.stats(),
    }))
}
