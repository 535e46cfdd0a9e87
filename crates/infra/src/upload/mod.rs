//! Asynchronous file upload.
//!
//! A request handler stages nothing itself: it registers an upload job and
//! returns. The job writes the file to the staging area, pushes it to remote
//! storage and then drops the staged copy, reporting progress to the owning
//! entity through [`UploadHooks`].

pub mod hooks;
pub mod pipeline;

pub use hooks::{
    AvatarHooks, ProductImageHooks, reserve_avatar_upload, spawn_avatar_upload,
    spawn_product_image_upload,
};
pub use pipeline::{UploadError, UploadHooks, UploadPipeline, UploadRequest};
