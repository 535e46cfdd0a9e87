//! Stage, upload, clean up.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::jobs::BackgroundJob;
use crate::storage::{StagingError, StagingStore, StorageBackend, StorageError};

/// Progress callbacks for the entity that owns an upload.
///
/// Each hook is invoked at most once per pipeline run. A hook that fails to
/// persist logs the failure itself; the pipeline carries on.
#[async_trait]
pub trait UploadHooks: Send + Sync {
    /// The file is durable in the staging area.
    async fn on_staged(&self);

    /// Remote storage accepted the file at `url`.
    async fn on_remote_success(&self, url: &str);
}

/// File handed over by a request handler.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Object key; also the path below the staging root.
    pub key: String,
    pub payload: Bytes,
}

impl UploadRequest {
    pub fn new(key: impl Into<String>, payload: Bytes) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Nothing was written; no hook ran.
    #[error("staging failed: {0}")]
    Staging(#[source] StagingError),

    /// The staged copy stays in place; `on_remote_success` did not run.
    #[error("remote upload failed: {0}")]
    Remote(#[source] StorageError),
}

/// Moves files from request memory through the staging area to remote storage.
#[derive(Clone)]
pub struct UploadPipeline {
    staging: Arc<dyn StagingStore>,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline").finish_non_exhaustive()
    }
}

impl UploadPipeline {
    pub fn new(staging: Arc<dyn StagingStore>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { staging, storage }
    }

    /// Run one upload to completion and return the public URL.
    ///
    /// Order: stage, `on_staged`, remote put, `on_remote_success`, remove the
    /// staged copy. A failed removal is logged and does not fail the run.
    #[instrument(
        skip(self, job, request, hooks),
        fields(job_id = %job.id, entity_id = %job.entity_id, key = %request.key)
    )]
    pub async fn run(
        &self,
        job: &BackgroundJob,
        request: UploadRequest,
        hooks: &dyn UploadHooks,
    ) -> Result<String, UploadError> {
        let UploadRequest { key, payload } = request;

        if let Err(e) = self.staging.write(&payload, &key).await {
            warn!(error = %e, "failed to stage upload");
            return Err(UploadError::Staging(e));
        }
        hooks.on_staged().await;

        let url = match self.storage.put(payload, &key).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "remote upload failed; staged copy kept");
                return Err(UploadError::Remote(e));
            }
        };
        hooks.on_remote_success(&url).await;

        if let Err(e) = self.staging.remove(&key).await {
            warn!(error = %e, "failed to remove staged file");
        }

        info!(url = %url, "upload finished");
        Ok(url)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles shared by the upload and integration tests.

    use std::sync::Mutex;

    use super::*;

    /// Records hook invocations in order.
    #[derive(Debug, Default)]
    pub struct RecordingHooks {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingHooks {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UploadHooks for RecordingHooks {
        async fn on_staged(&self) {
            self.events.lock().unwrap().push("staged".into());
        }

        async fn on_remote_success(&self, url: &str) {
            self.events.lock().unwrap().push(format!("remote:{url}"));
        }
    }

    /// Remote backend that always refuses.
    #[derive(Debug, Default)]
    pub struct FailingBackend;

    #[async_trait]
    impl StorageBackend for FailingBackend {
        async fn put(&self, _bytes: Bytes, key: &str) -> Result<String, StorageError> {
            Err(StorageError::InvalidKey(format!("refusing {key}")))
        }
    }

    /// Staging store whose writes always fail.
    #[derive(Debug, Default)]
    pub struct BrokenStaging;

    #[async_trait]
    impl StagingStore for BrokenStaging {
        async fn write(&self, _bytes: &Bytes, _path: &str) -> Result<(), StagingError> {
            Err(StagingError::Io(std::io::Error::other("disk full")))
        }

        async fn remove(&self, _path: &str) -> Result<(), StagingError> {
            Ok(())
        }
    }

    /// Staging store that accepts writes but cannot delete.
    #[derive(Debug, Default)]
    pub struct StickyStaging;

    #[async_trait]
    impl StagingStore for StickyStaging {
        async fn write(&self, _bytes: &Bytes, _path: &str) -> Result<(), StagingError> {
            Ok(())
        }

        async fn remove(&self, path: &str) -> Result<(), StagingError> {
            Err(StagingError::InvalidPath(path.to_string()))
        }
    }
}
