use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::api::response::AppJson;
use crate::auth::Identity;
use crate::object_store::{ReadHandle, UploadGrant};
use crate::sharing;
use crate::storage::models::FileRecord;
use crate::upload::{self, ensure_backend, IncomingFile, WorkflowError};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub is_public: bool,
    pub storage_key: String,
    pub backend: crate::object_store::StorageKind,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: Vec<FileResponse>,
    pub remaining_credits: u64,
}

#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    pub file_name: String,
    pub file_type: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub storage_key: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub file: FileResponse,
    pub remaining_credits: u64,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Upload handlers
// ============================================================================

/// Server-proxied multipart upload. Every part named `files` is one file of
/// the batch; the whole batch is rejected up front if the owner cannot
/// afford it.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    mut multipart: Multipart,
) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    let limits = state.upload_limits();
    let mut files: Vec<IncomingFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("files") {
            // Ignore unknown fields
            continue;
        }

        if files.len() >= limits.max_files {
            return Err(WorkflowError::TooManyFiles {
                count: files.len() + 1,
                max: limits.max_files,
            }
            .into());
        }

        let name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

        if data.len() as u64 > limits.max_bytes {
            return Err(WorkflowError::FileTooLarge {
                name,
                max: limits.max_bytes,
            }
            .into());
        }

        files.push(IncomingFile {
            name,
            content_type,
            data: Bytes::from(data),
        });
    }

    let outcome = upload::upload_batch(
        &state.db,
        state.object_store.as_ref(),
        identity.owner_id(),
        files,
        limits,
    )
    .await?;

    Ok(JSend::success(UploadResponse {
        files: outcome.files.iter().map(file_to_response).collect(),
        remaining_credits: outcome.remaining_credits,
    }))
}

/// Issue a direct-upload credential. Nothing is debited until registration.
pub async fn presigned_url(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppJson(req): AppJson<PresignRequest>,
) -> Result<Json<JSend<UploadGrant>>, ApiError> {
    if req.file_name.trim().is_empty() {
        return Err(ApiError::bad_request("file_name must not be empty"));
    }

    let limits = state.upload_limits();
    if let Some(size) = req.file_size {
        if size > limits.max_bytes {
            return Err(WorkflowError::FileTooLarge {
                name: req.file_name,
                max: limits.max_bytes,
            }
            .into());
        }
    }

    let grant = upload::issue_upload_grant(
        state.object_store.as_ref(),
        identity.owner_id(),
        &req.file_name,
        &req.file_type,
        limits,
    )
    .await?;

    Ok(JSend::success(grant))
}

/// Finalize a direct-to-storage upload: create the record, debit one credit.
pub async fn register_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<JSend<RegisterResponse>>), ApiError> {
    let (file, remaining_credits) = upload::register_upload(
        &state.db,
        state.object_store.as_ref(),
        identity.owner_id(),
        &req.storage_key,
        &req.file_name,
        &req.file_type,
        req.file_size,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        JSend::success(RegisterResponse {
            file: file_to_response(&file),
            remaining_credits,
        }),
    ))
}

// ============================================================================
// Read handlers
// ============================================================================

pub async fn my_files(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let files = state
        .db
        .get_files_by_owner(identity.owner_id())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let total = files.len() as u64;
    let items: Vec<FileResponse> = files
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(file_to_response)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

/// Metadata for a public file. Private files are indistinguishable from
/// missing ones here.
pub async fn public_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|f| f.is_public)
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    Ok(JSend::success(file_to_response(&file)))
}

/// Obtain a download for a file: a URL for URL-addressable backends, an
/// attachment stream otherwise. Private files are owner-only.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    identity: Option<Identity>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if !file.is_public {
        let owner = identity
            .as_ref()
            .map(|i| i.owner_id())
            .ok_or_else(|| ApiError::unauthorized("No token provided"))?;
        if owner != file.owner_id {
            return Err(ApiError::forbidden("Not authorized"));
        }
    }

    ensure_backend(&file, state.object_store.as_ref())?;

    let handle = state
        .object_store
        .resolve_read(&file.storage_key, file.is_public)
        .await
        .map_err(|e| ApiError::from(WorkflowError::Store(e)))?;

    match handle {
        ReadHandle::Url(url) => Ok(JSend::success(UrlResponse { url }).into_response()),
        ReadHandle::Bytes(data) => Ok(content_response(&file, data, "attachment")),
    }
}

/// Inline content of a public file. 403 for private files.
pub async fn raw_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if !file.is_public {
        return Err(ApiError::forbidden("File is private"));
    }

    ensure_backend(&file, state.object_store.as_ref())?;

    let handle = state
        .object_store
        .resolve_read(&file.storage_key, true)
        .await
        .map_err(|e| ApiError::from(WorkflowError::Store(e)))?;

    match handle {
        ReadHandle::Url(url) => Ok(Redirect::temporary(&url).into_response()),
        ReadHandle::Bytes(data) => Ok(content_response(&file, data, "inline")),
    }
}

/// Short-lived view link for the owner's own file. URL-addressable backends
/// return a signed URL; the rest stream the bytes inline.
pub async fn view_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if !file.is_public && file.owner_id != identity.owner_id() {
        return Err(ApiError::forbidden("Not authorized"));
    }

    ensure_backend(&file, state.object_store.as_ref())?;

    let handle = state
        .object_store
        .resolve_read(&file.storage_key, file.is_public)
        .await
        .map_err(|e| ApiError::from(WorkflowError::Store(e)))?;

    match handle {
        ReadHandle::Url(url) => Ok(JSend::success(UrlResponse { url }).into_response()),
        ReadHandle::Bytes(data) => Ok(content_response(&file, data, "inline")),
    }
}

// ============================================================================
// Mutation handlers
// ============================================================================

/// Delete a file and its bytes. Owner-only. The bytes go first: a storage
/// failure leaves the record intact and surfaces as an error.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if file.owner_id != identity.owner_id() {
        return Err(ApiError::forbidden("Not authorized"));
    }

    ensure_backend(&file, state.object_store.as_ref())?;

    state
        .object_store
        .delete(&file.storage_key)
        .await
        .map_err(|e| ApiError::from(WorkflowError::Store(e)))?;

    state
        .db
        .delete_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::debug!(file_id = %id, "Deleted file");
    Ok(JSend::success(()))
}

pub async fn toggle_public(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let updated = sharing::toggle_public(
        &state.db,
        state.object_store.as_ref(),
        &id,
        identity.owner_id(),
    )
    .await?;

    Ok(JSend::success(file_to_response(&updated)))
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        id: file.id.clone(),
        name: file.name.clone(),
        byte_size: file.byte_size,
        mime_type: file.mime_type.clone(),
        is_public: file.is_public,
        storage_key: file.storage_key.clone(),
        backend: file.backend,
        created_at: file.created_at.to_rfc3339(),
    }
}

fn content_response(file: &FileRecord, data: Bytes, disposition: &str) -> Response {
    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        header::HeaderValue::from(file.byte_size),
    );
    if let Ok(value) = format!("{disposition}; filename=\"{}\"", file.name).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}
