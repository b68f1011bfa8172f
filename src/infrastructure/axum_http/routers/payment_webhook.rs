use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;
use tracing::{info, warn};

use crate::domain::value_objects::webhook::WebhookEnvelope;
use crate::infrastructure::payments::pix_client::PixClient;
use crate::infrastructure::queue::reconcile_queue::ReconcileQueue;

pub struct WebhookState {
    pub queue: ReconcileQueue,
    pub pix_client: Arc<PixClient>,
}

pub fn routes(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/payment-webhook", post(payment_webhook))
        .with_state(state)
}

/// Provider notification endpoint. Acknowledges immediately in all non-crash
/// cases; reconciliation happens on the queue workers, which re-fetch the
/// authoritative status instead of trusting anything in this body.
pub async fn payment_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let envelope = WebhookEnvelope::parse(&body);
    let Some(payment_id) = envelope.payment_id() else {
        warn!(
            body = %String::from_utf8_lossy(&body),
            "payment_webhook: notification without payment id; ignoring"
        );
        return ack();
    };

    // Signature validation is advisory: the scheme is not stable across
    // provider product lines, so a failure is logged and delivery proceeds.
    if state.pix_client.has_webhook_secret() {
        let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        match signature {
            Some(signature) => {
                if let Err(err) =
                    state
                        .pix_client
                        .verify_webhook_signature(signature, request_id, &payment_id)
                {
                    warn!(
                        payment_id = %payment_id,
                        error = %err,
                        "payment_webhook: signature validation failed; processing anyway"
                    );
                }
            }
            None => {
                warn!(
                    payment_id = %payment_id,
                    "payment_webhook: x-signature header missing; processing anyway"
                );
            }
        }
    }

    info!(payment_id = %payment_id, "payment_webhook: notification received");
    state.queue.enqueue(payment_id);

    ack()
}

fn ack() -> Response {
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}
