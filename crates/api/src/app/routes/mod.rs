use axum::{Router, routing::get};

pub mod common;
pub mod products;
pub mod reports;
pub mod system;
pub mod transactions;
pub mod users;

/// Router for every resource endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/products", products::router())
        .nest("/users", users::router())
        .nest("/transactions", transactions::router())
        .nest("/reports", reports::router())
}
