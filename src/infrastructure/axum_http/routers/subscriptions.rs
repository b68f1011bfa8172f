use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::error;

use crate::application::usecases::subscriptions::{SubscriptionError, SubscriptionUseCase};
use crate::domain::value_objects::subscriptions::{RequestPaymentRequest, StartOrRenewRequest};

pub fn routes(usecase: Arc<SubscriptionUseCase>) -> Router {
    Router::new()
        .route("/start", post(start_or_renew))
        .route("/checkout", post(request_payment))
        .route("/payments/:payment_id/check", post(check_payment))
        .with_state(usecase)
}

pub async fn start_or_renew(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Json(payload): Json<StartOrRenewRequest>,
) -> Response {
    match usecase.start_or_renew(payload.user_id).await {
        Ok(menu) => Json(menu).into_response(),
        Err(err) => map_error("start_or_renew", err),
    }
}

pub async fn request_payment(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Json(payload): Json<RequestPaymentRequest>,
) -> Response {
    match usecase
        .request_payment(payload.user_id, payload.plan_code)
        .await
    {
        Ok(checkout) => Json(checkout).into_response(),
        Err(err) => map_error("request_payment", err),
    }
}

pub async fn check_payment(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Path(payment_id): Path<String>,
) -> Response {
    match usecase.check_payment(&payment_id).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => map_error("check_payment", err),
    }
}

fn map_error(label: &str, err: SubscriptionError) -> Response {
    let status = err.status_code();
    error!(
        status = status.as_u16(),
        error = %err,
        "subscriptions: {} failed",
        label
    );
    (status, err.to_string()).into_response()
}
