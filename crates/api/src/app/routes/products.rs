use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use storefront_core::ProductId;
use storefront_products::CreateProduct;

use crate::app::errors;
use crate::app::routes::common::MultipartForm;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", get(get_product))
}

/// Multipart fields: `name`, `price`, `stock`, optional file `image`.
///
/// Responds as soon as the product is stored; the image upload continues in
/// the background and is observed through `image_status`.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    multipart: Multipart,
) -> axum::response::Response {
    let mut form = match MultipartForm::read(multipart).await {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let cmd = match product_command(&form) {
        Ok(cmd) => cmd,
        Err(resp) => return resp,
    };
    let image = form.take_file("image");

    match services.create_product(cmd, image).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn product_command(form: &MultipartForm) -> Result<CreateProduct, axum::response::Response> {
    Ok(CreateProduct {
        name: form.text("name")?,
        price: form.number("price")?,
        stock: form.number("stock")?,
        with_image: false,
    })
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_product(id).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
