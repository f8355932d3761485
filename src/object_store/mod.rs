mod blob;
mod local;
mod s3;

pub use blob::BlobStore;
pub use local::LocalStore;
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Operation not supported by the {0:?} backend")]
    Unsupported(StorageKind),
}

/// Which backend owns a storage key. Recorded on every file record at
/// creation time; a key is never reinterpreted under a different backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Blob,
    S3,
}

/// How a stored object can be read back: the bytes themselves, or a
/// short-lived URL the client fetches directly.
#[derive(Debug)]
pub enum ReadHandle {
    Bytes(Bytes),
    Url(String),
}

/// A time-limited credential permitting a direct client upload that bypasses
/// the server for the byte transfer.
#[derive(Debug, Serialize)]
pub struct UploadGrant {
    /// Where the client POSTs the bytes.
    pub url: String,
    /// Form fields that must accompany the upload.
    pub fields: HashMap<String, String>,
    /// The storage key the client hands back at registration.
    pub storage_key: String,
    pub expires_in_secs: u64,
}

/// Abstraction over file-byte storage backends. Keys are opaque to callers;
/// the raw blobs are meaningless without the metadata database.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// The discriminator recorded on file records created against this store.
    fn kind(&self) -> StorageKind;

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), ObjectStoreError>;

    /// Resolve a key for reading. `public` selects the unauthenticated form
    /// where the backend distinguishes (public URL vs signed URL).
    async fn resolve_read(&self, key: &str, public: bool) -> Result<ReadHandle, ObjectStoreError>;

    /// Deleting a missing object is not an error -- treated as already done.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Issue a direct-upload credential binding the content type and a byte
    /// ceiling. Backends without direct upload return `Unsupported`.
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        max_bytes: u64,
    ) -> Result<UploadGrant, ObjectStoreError> {
        let _ = (key, content_type, max_bytes);
        Err(ObjectStoreError::Unsupported(self.kind()))
    }

    /// Synchronize the backend's access control with the visibility flag.
    /// Backends without per-object ACLs treat this as a no-op.
    async fn set_visibility(&self, key: &str, public: bool) -> Result<(), ObjectStoreError> {
        let _ = (key, public);
        Ok(())
    }
}
