//! Webhook and health routes.
//!
//! A delivery is verified, classified and decoded on the request path; the
//! dispatch itself happens after the response is sent.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use pipeline::{EventSink, ForgeEvent, ForgeSource, ForgebotError};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::ApiResult;
use crate::signature::WebhookVerifier;
use crate::source::{detect_source, event_type};

/// Payload key recording which forge delivered the event.
pub const WEBHOOK_SOURCE_KEY: &str = "webhook_source";

/// Default upper bound on a webhook body (25 MiB, GitHub's own delivery cap).
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared state of the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    verifier: Arc<WebhookVerifier>,
    sink: Arc<dyn EventSink>,
}

impl WebhookState {
    /// Creates the state; accepted events are handed to `sink`.
    pub fn new(verifier: WebhookVerifier, sink: Arc<dyn EventSink>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            sink,
        }
    }
}

/// Builds the HTTP surface: `POST /webhook` and `GET /health`.
///
/// Bodies larger than `max_body_bytes` are refused with 413 before any
/// verification happens.
pub fn router(state: WebhookState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Verifies, classifies and decodes one delivery, then hands it off.
///
/// Responds as soon as the event is submitted; the dispatch outcome is never
/// visible to the sender.
async fn receive_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let source = detect_source(&headers);
    debug!(%source, "Detected webhook source");

    let event = accept(&state.verifier, source, &headers, body)
        .inspect_err(|e| warn!(%source, error = %e, "Rejected webhook delivery"))?;

    info!(%source, event_type = %event.event_type, "Received event");
    state.sink.submit(event);
    Ok(StatusCode::OK)
}

fn accept(
    verifier: &WebhookVerifier,
    source: ForgeSource,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ForgeEvent, ForgebotError> {
    let body = verifier.verify(source, headers, body)?;

    let event_type = event_type(headers, source)
        .ok_or_else(|| ForgebotError::decode(format!("missing {source} event type header")))?;

    let mut payload = forge::decode_payload(&body)?;
    payload.insert(
        WEBHOOK_SOURCE_KEY.to_string(),
        Value::String(source.as_str().to_string()),
    );

    Ok(ForgeEvent::new(source, event_type, payload))
}
