//! File storage used by the upload pipeline.
//!
//! - `StagingStore`: durable local copy written before any remote call
//! - `StorageBackend`: remote object storage returning a public URL

pub mod backend;
pub mod staging;

pub use backend::{ObjectStoreBackend, StorageBackend, StorageError};
pub use staging::{LocalStagingStore, StagingError, StagingStore};

use std::path::{Component, Path};

/// True when `key` is a relative path without parent or root components.
pub(crate) fn is_safe_relative(key: &str) -> bool {
    let relative = Path::new(key);
    !key.is_empty()
        && !relative.is_absolute()
        && !relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}
