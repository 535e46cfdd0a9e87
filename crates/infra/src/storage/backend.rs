//! Remote object storage behind [`object_store`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, PutPayload, path::Path as ObjPath};
use tracing::instrument;

use super::is_safe_relative;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote storage that accepts a byte payload under a key and returns the
/// public URL the object can be fetched from.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, bytes: Bytes, key: &str) -> Result<String, StorageError>;
}

/// [`StorageBackend`] over any [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl std::fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("store", &self.store.to_string())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Filesystem-backed store rooted at `root`, created if missing.
    pub fn local(root: impl AsRef<Path>, public_base_url: impl Into<String>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(Arc::new(store), public_base_url))
    }

    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), public_base_url)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Fetch a stored object.
    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = object_path(key)?;
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?)
    }
}

fn object_path(key: &str) -> Result<ObjPath, StorageError> {
    if !is_safe_relative(key) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    ObjPath::parse(key).map_err(|e| StorageError::InvalidKey(format!("{key}: {e}")))
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    async fn put(&self, bytes: Bytes, key: &str) -> Result<String, StorageError> {
        let path = object_path(key)?;
        self.store.put(&path, PutPayload::from_bytes(bytes)).await?;
        Ok(self.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_returns_public_url_and_stores_bytes() {
        let backend = ObjectStoreBackend::in_memory("https://cdn.example.com/uploads/");
        let url = backend
            .put(Bytes::from_static(b"png-bytes"), "products/p1.png")
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/uploads/products/p1.png");
        let stored = backend.get("products/p1.png").await.unwrap();
        assert_eq!(stored.as_ref(), b"png-bytes");
    }

    #[tokio::test]
    async fn local_backend_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ObjectStoreBackend::local(dir.path().join("remote"), "/public/uploads").unwrap();

        let url = backend
            .put(Bytes::from_static(b"avatar"), "avatars/u1.jpg")
            .await
            .unwrap();

        assert_eq!(url, "/public/uploads/avatars/u1.jpg");
        let on_disk = std::fs::read(dir.path().join("remote/avatars/u1.jpg")).unwrap();
        assert_eq!(on_disk, b"avatar");
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let backend = ObjectStoreBackend::in_memory("/u");
        let err = backend
            .put(Bytes::from_static(b"x"), "../escape.png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
