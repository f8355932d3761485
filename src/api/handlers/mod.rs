mod admin;
mod credits;
mod files;
mod payments;
mod webhooks;

use axum::http::HeaderMap;

use crate::api::response::ApiError;
use crate::AppState;

pub use admin::{admin_purge, health};
pub use credits::{add_credits, get_credits};
pub use files::{
    delete_file, download_file, my_files, presigned_url, public_file, raw_file, register_file,
    toggle_public, upload_files, view_file,
};
pub use payments::{all_payments, create_order, my_payments, verify_payment};
pub use webhooks::clerk_webhook;

/// Guard for admin-only endpoints: the `x-api-key` header must match the
/// configured admin key. With no key configured, everything is rejected.
fn require_admin_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let configured = state
        .config
        .admin_api_key
        .as_deref()
        .ok_or_else(|| ApiError::forbidden("Admin access is not configured"))?;

    let provided = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing API key"))?;

    if !crate::signing::verify_signature(configured, provided) {
        return Err(ApiError::forbidden("Invalid API key"));
    }
    Ok(())
}
