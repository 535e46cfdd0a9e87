//! Products domain module.
//!
//! Catalog products carry an optional image that is moved to remote storage by
//! a background upload job (single-stage flow: `uploading → cloud | failed`).
//! Pure domain logic only (no IO, no HTTP, no storage).

pub mod product;

pub use product::{CreateProduct, PRODUCT_IMAGE_PREFIX, Product};
