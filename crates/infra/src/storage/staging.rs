//! Local staging area for uploads in progress.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::is_safe_relative;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("invalid staging path: {0}")]
    InvalidPath(String),

    #[error("staging io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable local storage written before the remote upload is attempted.
#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn write(&self, bytes: &Bytes, path: &str) -> Result<(), StagingError>;
    async fn remove(&self, path: &str) -> Result<(), StagingError>;
}

/// [`StagingStore`] on the local filesystem, rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalStagingStore {
    root: PathBuf,
}

impl LocalStagingStore {
    /// Use `root` as the staging directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StagingError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a staging path below the root. Absolute paths and parent
    /// traversals are rejected.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StagingError> {
        if !is_safe_relative(path) {
            return Err(StagingError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl StagingStore for LocalStagingStore {
    async fn write(&self, bytes: &Bytes, path: &str) -> Result<(), StagingError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StagingError> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target).await?;
        Ok(())
    }
}
