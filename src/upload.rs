//! The upload-and-credit-accounting workflow.
//!
//! Two shapes produce the same end state: server-proxied multipart uploads
//! (bytes pass through the server) and direct-to-storage uploads (the server
//! only issues a presigned credential and later registers the result). In
//! both, one credit is debited per stored file, and the balance precheck is
//! all-or-nothing for the batch.

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;

use crate::object_store::{ObjectStore, ObjectStoreError, StorageKind, UploadGrant};
use crate::storage::models::FileRecord;
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No files uploaded")]
    NoFiles,
    #[error("Too many files: {count} exceeds the limit of {max}")]
    TooManyFiles { count: usize, max: usize },
    #[error("File '{name}' exceeds the maximum size of {max} bytes")]
    FileTooLarge { name: String, max: u64 },
    #[error("Not enough credits: have {have}, need {need}")]
    InsufficientCredits { have: u64, need: u64 },
    #[error("File not found")]
    NotFound,
    #[error("Not authorized")]
    NotAuthorized,
    #[error("File was stored on the {recorded:?} backend but the server is configured for {active:?}")]
    UnsupportedStorage {
        recorded: StorageKind,
        active: StorageKind,
    },
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
    #[error("Database error: {0}")]
    Db(DatabaseError),
}

impl From<DatabaseError> for WorkflowError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::InsufficientCredits { have, need } => {
                WorkflowError::InsufficientCredits { have, need }
            }
            other => WorkflowError::Db(other),
        }
    }
}

/// Ceilings enforced before any byte transfer begins.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_bytes: u64,
}

/// One file of a server-proxied batch, already read off the wire.
pub struct IncomingFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// The result of an upload: created records plus what is left on the ledger.
#[derive(Debug)]
pub struct UploadOutcome {
    pub files: Vec<FileRecord>,
    pub remaining_credits: u64,
}

/// Storage keys are scoped per owner and carry the original filename, so a
/// bucket listing stays legible.
fn storage_key(owner_id: &str, file_name: &str) -> String {
    format!(
        "uploads/{owner_id}/{}-{file_name}",
        Utc::now().timestamp_millis()
    )
}

fn resolve_mime(content_type: Option<&str>, file_name: &str) -> String {
    content_type
        .filter(|ct| *ct != "application/octet-stream")
        .map(|ct| ct.to_string())
        .or_else(|| {
            mime_guess::from_path(file_name)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Reject reads/deletes of records whose key belongs to a different backend
/// than the one currently configured. Keys are never reinterpreted.
pub fn ensure_backend(record: &FileRecord, store: &dyn ObjectStore) -> Result<(), WorkflowError> {
    if record.backend != store.kind() {
        return Err(WorkflowError::UnsupportedStorage {
            recorded: record.backend,
            active: store.kind(),
        });
    }
    Ok(())
}

/// Server-proxied batch upload.
///
/// The balance precheck is all-or-nothing: if the owner cannot afford the
/// whole batch, nothing is stored and nothing is debited. Past that point
/// the batch is processed file by file; a storage failure mid-batch leaves
/// earlier files stored and debited (documented partial-failure behavior).
pub async fn upload_batch(
    db: &Database,
    store: &dyn ObjectStore,
    owner_id: &str,
    files: Vec<IncomingFile>,
    limits: UploadLimits,
) -> Result<UploadOutcome, WorkflowError> {
    if files.is_empty() {
        return Err(WorkflowError::NoFiles);
    }
    if files.len() > limits.max_files {
        return Err(WorkflowError::TooManyFiles {
            count: files.len(),
            max: limits.max_files,
        });
    }
    for file in &files {
        if file.data.len() as u64 > limits.max_bytes {
            return Err(WorkflowError::FileTooLarge {
                name: file.name.clone(),
                max: limits.max_bytes,
            });
        }
    }

    let balance = db.ensure_credits(owner_id)?;
    let need = files.len() as u64;
    if balance.credits < need {
        return Err(WorkflowError::InsufficientCredits {
            have: balance.credits,
            need,
        });
    }

    let mut created = Vec::with_capacity(files.len());
    let mut remaining = balance.credits;

    for file in files {
        let mime_type = resolve_mime(file.content_type.as_deref(), &file.name);
        let key = storage_key(owner_id, &file.name);
        let byte_size = file.data.len() as u64;

        store.put(&key, file.data, &mime_type).await?;

        let record = FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            storage_key: key,
            backend: store.kind(),
            name: file.name,
            byte_size,
            mime_type,
            is_public: false,
            created_at: Utc::now(),
        };
        db.put_file(&record)?;

        remaining = db.debit_credits(owner_id, 1)?.credits;

        tracing::debug!(file_id = %record.id, owner = %owner_id, "Stored file");
        created.push(record);
    }

    Ok(UploadOutcome {
        files: created,
        remaining_credits: remaining,
    })
}

/// Issue a direct-upload credential. Nothing is debited here -- the debit
/// happens at registration, once the record exists.
pub async fn issue_upload_grant(
    store: &dyn ObjectStore,
    owner_id: &str,
    file_name: &str,
    content_type: &str,
    limits: UploadLimits,
) -> Result<UploadGrant, WorkflowError> {
    let key = storage_key(owner_id, file_name);
    let grant = store
        .presign_upload(&key, content_type, limits.max_bytes)
        .await?;
    Ok(grant)
}

/// Finalize a direct-to-storage upload. This is the atomicity boundary: the
/// record plus the debit are the only proof the upload happened.
pub async fn register_upload(
    db: &Database,
    store: &dyn ObjectStore,
    owner_id: &str,
    storage_key: &str,
    file_name: &str,
    content_type: &str,
    byte_size: u64,
) -> Result<(FileRecord, u64), WorkflowError> {
    let balance = db.ensure_credits(owner_id)?;
    if balance.credits < 1 {
        return Err(WorkflowError::InsufficientCredits {
            have: balance.credits,
            need: 1,
        });
    }

    let record = FileRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        storage_key: storage_key.to_string(),
        backend: store.kind(),
        name: file_name.to_string(),
        byte_size,
        mime_type: resolve_mime(Some(content_type), file_name),
        is_public: false,
        created_at: Utc::now(),
    };
    db.put_file(&record)?;

    let remaining = match db.debit_credits(owner_id, 1) {
        Ok(balance) => balance.credits,
        Err(e) => {
            // A concurrent debit beat us to the last credit. Undo the record
            // so the owner is not left with an uncharged file.
            let _ = db.delete_file(&record.id);
            return Err(e.into());
        }
    };

    tracing::debug!(file_id = %record.id, owner = %owner_id, "Registered direct upload");
    Ok((record, remaining))
}
