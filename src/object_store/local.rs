use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::{ObjectStore, ObjectStoreError, ReadHandle, StorageKind};

/// Local filesystem backend. Keys are filenames under a managed directory.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Legacy records stored absolute paths as keys; honor those when the
    /// file still exists, otherwise resolve relative to the managed dir.
    fn object_path(&self, key: &str) -> PathBuf {
        let as_path = Path::new(key);
        if as_path.is_absolute() && as_path.exists() {
            return as_path.to_path_buf();
        }
        self.base_path.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn resolve_read(
        &self,
        key: &str,
        _public: bool,
    ) -> Result<ReadHandle, ObjectStoreError> {
        let path = self.object_path(key);
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(ReadHandle::Bytes(Bytes::from(data)))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.object_path(key).exists())
    }
}
