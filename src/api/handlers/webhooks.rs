use axum::extract::State;
use axum::http::HeaderMap;
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::signing::{hmac_sha256_hex, verify_signature};
use crate::storage::models::INITIAL_CREDITS;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

/// Identity-provider lifecycle events. The signature check runs only in
/// production mode; development deliveries are trusted.
pub async fn clerk_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    if state.config.production {
        let secret = state
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| ApiError::internal("Webhook secret not configured"))?;

        let signature = headers
            .get("svix-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::bad_request("Missing signature header"))?;

        let expected = hmac_sha256_hex(secret, &body);
        if !verify_signature(&expected, signature) {
            return Err(ApiError::bad_request("Invalid signature"));
        }
    } else {
        tracing::debug!("Skipping webhook signature verification outside production");
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid webhook payload: {e}")))?;

    let owner_id = event.data.id.as_str();
    let email = event
        .data
        .email_addresses
        .first()
        .map(|e| e.email_address.as_str());

    match event.event_type.as_str() {
        "user.created" => {
            state
                .db
                .upsert_profile(
                    owner_id,
                    email.unwrap_or_default(),
                    event.data.first_name.as_deref(),
                    event.data.last_name.as_deref(),
                    event.data.profile_image_url.as_deref(),
                )
                .map_err(|e| ApiError::internal(e.to_string()))?;

            // Starting grant for the new user
            state
                .db
                .ensure_credits(owner_id)
                .map_err(|e| ApiError::internal(e.to_string()))?;

            tracing::info!(owner = %owner_id, credits = INITIAL_CREDITS, "User created");
        }
        "user.updated" => {
            state
                .db
                .upsert_profile(
                    owner_id,
                    email.unwrap_or_default(),
                    event.data.first_name.as_deref(),
                    event.data.last_name.as_deref(),
                    event.data.profile_image_url.as_deref(),
                )
                .map_err(|e| ApiError::internal(e.to_string()))?;

            tracing::info!(owner = %owner_id, "User updated");
        }
        "user.deleted" => {
            state
                .db
                .delete_profile(owner_id)
                .map_err(|e| ApiError::internal(e.to_string()))?;

            tracing::info!(owner = %owner_id, "User deleted");
        }
        other => {
            tracing::debug!(event = %other, "Ignoring webhook event");
        }
    }

    Ok("ok")
}
