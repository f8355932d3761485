use async_trait::async_trait;
use bytes::Bytes;
use redb::{Database as RedbDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

use super::{ObjectStore, ObjectStoreError, ReadHandle, StorageKind};

/// Blob contents: blob id -> raw bytes
const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");

/// Legacy alias index: filename -> blob id. Older records referenced blobs
/// by filename rather than id; lookups fall back through this table.
const BLOB_ALIASES: TableDefinition<&str, &str> = TableDefinition::new("blob_aliases");

/// Database-blob backend: file bytes live in a dedicated redb bucket next to
/// the metadata database. Keys are blob ids.
pub struct BlobStore {
    db: Arc<RedbDatabase>,
}

impl BlobStore {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, ObjectStoreError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let path = data_dir.as_ref().join("blobs.redb");
        let db = RedbDatabase::create(path).map_err(backend)?;

        let write_txn = db.begin_write().map_err(backend)?;
        {
            let _ = write_txn.open_table(BLOBS).map_err(backend)?;
            let _ = write_txn.open_table(BLOB_ALIASES).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Resolve a key to the blob id, following the alias index when the
    /// direct lookup misses.
    fn resolve_id(&self, key: &str) -> Result<Option<String>, ObjectStoreError> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let blobs = read_txn.open_table(BLOBS).map_err(backend)?;
        if blobs.get(key).map_err(backend)?.is_some() {
            return Ok(Some(key.to_string()));
        }
        let aliases = read_txn.open_table(BLOB_ALIASES).map_err(backend)?;
        Ok(aliases
            .get(key)
            .map_err(backend)?
            .map(|v| v.value().to_string()))
    }
}

#[async_trait]
impl ObjectStore for BlobStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Blob
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(BLOBS).map_err(backend)?;
            table.insert(key, data.as_ref()).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    async fn resolve_read(
        &self,
        key: &str,
        _public: bool,
    ) -> Result<ReadHandle, ObjectStoreError> {
        let id = self
            .resolve_id(key)?
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;

        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(BLOBS).map_err(backend)?;
        match table.get(id.as_str()).map_err(backend)? {
            Some(data) => Ok(ReadHandle::Bytes(Bytes::copy_from_slice(data.value()))),
            None => Err(ObjectStoreError::NotFound(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        // Missing blobs are treated as already deleted.
        let id = match self.resolve_id(key)? {
            Some(id) => id,
            None => return Ok(()),
        };

        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(BLOBS).map_err(backend)?;
            table.remove(id.as_str()).map_err(backend)?;

            let mut aliases = write_txn.open_table(BLOB_ALIASES).map_err(backend)?;
            aliases.remove(key).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.resolve_id(key)?.is_some())
    }
}

fn backend<E: std::fmt::Display>(e: E) -> ObjectStoreError {
    ObjectStoreError::Backend(e.to_string())
}
