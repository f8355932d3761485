use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::require_admin_key;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::auth::Identity;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub credits: u64,
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    pub owner_id: String,
    pub credits_to_add: u64,
    #[serde(default)]
    pub plan: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Fetch the caller's balance, lazily creating it with the starting grant.
/// Also refreshes the profile cache when the token carries an email.
pub async fn get_credits(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<JSend<CreditsResponse>>, ApiError> {
    let claims = &identity.0;
    if let Some(email) = claims.email.as_deref() {
        state
            .db
            .upsert_profile(
                &claims.sub,
                email,
                claims.first_name.as_deref(),
                claims.last_name.as_deref(),
                None,
            )
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    let balance = state
        .db
        .ensure_credits(identity.owner_id())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(JSend::success(CreditsResponse {
        credits: balance.credits,
        plan: balance.plan,
    }))
}

/// Out-of-band credit grant, for support and payment-provider callbacks.
/// Guarded by the admin API key.
pub async fn add_credits(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    AppJson(req): AppJson<AddCreditsRequest>,
) -> Result<Json<JSend<CreditsResponse>>, ApiError> {
    require_admin_key(&state, &headers)?;

    let balance = state
        .db
        .credit_credits(&req.owner_id, req.credits_to_add, req.plan.as_deref())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::info!(owner = %req.owner_id, credits = req.credits_to_add, "Out-of-band credit grant");

    Ok(JSend::success(CreditsResponse {
        credits: balance.credits,
        plan: balance.plan,
    }))
}
