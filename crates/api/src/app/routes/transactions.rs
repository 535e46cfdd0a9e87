use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use storefront_core::TransactionId;
use storefront_sales::PaymentOutcome;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transaction))
        .route("/:id", get(get_transaction))
        .route("/:id/pay", post(pay_transaction))
}

pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateTransactionRequest>,
) -> axum::response::Response {
    let cmd = match body.into_command() {
        Ok(cmd) => cmd,
        Err(resp) => return resp,
    };
    match services.create_transaction(cmd).await {
        Ok(tx) => (StatusCode::CREATED, Json(tx)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransactionId = match errors::parse_id(&id, "transaction") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_transaction(id).await {
        Ok(tx) => (StatusCode::OK, Json(tx)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Mark the transaction paid. The report refresh runs in the background;
/// paying twice succeeds without scheduling another refresh.
pub async fn pay_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransactionId = match errors::parse_id(&id, "transaction") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.mark_paid(id).await {
        Ok((transaction, outcome)) => (
            StatusCode::OK,
            Json(dto::PaymentResponse {
                transaction,
                already_paid: outcome == PaymentOutcome::AlreadyPaid,
            }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
