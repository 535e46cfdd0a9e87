//! `storefront-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, the image status vocabulary shared by
//! every uploadable entity, and product categories.

pub mod category;
pub mod entity;
pub mod error;
pub mod id;
pub mod image_status;

pub use category::ProductCategory;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProductId, TransactionId, UserId};
pub use image_status::{ImageStatus, Uploadable, upload_key};
