use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use storefront_core::UserId;
use storefront_users::CreateUser;

use crate::app::routes::common::MultipartForm;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_user))
        .route("/:id", get(get_user))
        .route("/:id/profile", put(update_profile))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    let cmd = CreateUser {
        name: body.name,
        email: body.email,
    };
    match services.create_user(cmd).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_user(id).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Multipart fields: `name`, optional file `avatar`.
///
/// A new avatar is refused with 409 while the previous one is still being
/// uploaded.
pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut form = match MultipartForm::read(multipart).await {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let name = match form.text("name") {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let avatar = form.take_file("avatar");

    match services.update_profile(id, name, avatar).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
