//! HTTP webhook intake.
//!
//! Map producers `POST` either a single `{type, message}` envelope or a JSON
//! array of envelopes to `/`. Every element is handed to the [`Ingestor`]
//! independently; a bad element is logged and counted, never fatal to the
//! rest of the delivery.
//!
//! | Status | When |
//! |--------|------|
//! | `200 OK` | every element was queued, coalesced, or deliberately dropped |
//! | `503 Service Unavailable` | at least one element hit a full queue; the producer may resend |
//! | `500 Internal Server Error` | the queue lock is poisoned |
//! | `400` / `413` / `415` | body is not JSON, too large, or has the wrong content type |

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ingest::{DeliveryId, IngestOutcome, Ingestor, WebhookEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

use crate::errors::ListenerError;

/// Per-delivery counts returned to the producer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySummary {
    /// Elements queued or coalesced into a waiting entry.
    pub accepted: usize,
    /// Elements that were not alertable, malformed, or outside every geofence.
    pub dropped: usize,
    /// Elements that could not be queued.
    pub rejected: usize,
}

/// Builds the webhook router.
///
/// `max_body_bytes` is the only body limit; the `Json` extractor's own 2 MiB
/// default is disabled so larger configured limits take effect.
pub fn build_router(ingestor: Ingestor, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(receive))
        .route("/health", get(health))
        .with_state(ingestor)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Binds `addr` and serves `router` until `shutdown` completes.
pub async fn serve<F>(addr: SocketAddr, router: Router, shutdown: F) -> Result<(), ListenerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;
    info!(%addr, "webhook listener started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ListenerError::Serve)
}

async fn health() -> &'static str {
    "OK"
}

async fn receive(State(ingestor): State<Ingestor>, Json(body): Json<Value>) -> Response {
    let (status, summary) = ingest_delivery(&ingestor, body);
    (status, Json(summary)).into_response()
}

fn ingest_delivery(ingestor: &Ingestor, body: Value) -> (StatusCode, DeliverySummary) {
    let delivery = DeliveryId::new_random();
    let span = info_span!("webhook_delivery", %delivery);
    let _entered = span.enter();

    let elements = match body {
        Value::Array(elements) => elements,
        single => vec![single],
    };

    let mut summary = DeliverySummary::default();
    for element in elements {
        let envelope: WebhookEnvelope = match serde_json::from_value(element) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "skipping element that is not a webhook envelope");
                summary.dropped += 1;
                continue;
            }
        };

        match ingestor.ingest(&envelope) {
            Ok(IngestOutcome::Queued { .. } | IngestOutcome::Coalesced { .. }) => {
                summary.accepted += 1;
            }
            Ok(IngestOutcome::Dropped | IngestOutcome::OutsideGeofence { .. }) => {
                summary.dropped += 1;
            }
            Err(err) if err.is_retryable() => {
                warn!(kind = %envelope.kind, error = %err, "queue saturated; rejecting event");
                summary.rejected += 1;
            }
            Err(err) => {
                error!(error = %err, "event queue unusable");
                summary.rejected += 1;
                return (StatusCode::INTERNAL_SERVER_ERROR, summary);
            }
        }
    }

    let status = if summary.rejected > 0 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, summary)
}
