use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/transactions", get(transaction_report))
}

/// The aggregate report as last committed (zeroed before the first refresh).
pub async fn transaction_report(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.report().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
