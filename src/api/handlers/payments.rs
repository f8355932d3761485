use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::require_admin_key;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::auth::Identity;
use crate::payments;
use crate::storage::models::PaymentTransaction;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub plan_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub credits: u64,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub owner_id: String,
    pub order_id: String,
    pub payment_id: String,
    pub plan_id: String,
    pub credits_added: u64,
    pub amount: u64,
    pub status: String,
    pub created_at: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    AppJson(req): AppJson<CreateOrderRequest>,
) -> Result<Json<JSend<CreateOrderResponse>>, ApiError> {
    if req.amount == 0 || req.currency.trim().is_empty() {
        return Err(ApiError::bad_request("Amount and currency are required"));
    }

    let order_id = state.gateway.create_order(req.amount, &req.currency).await?;
    Ok(JSend::success(CreateOrderResponse { order_id }))
}

/// Verify a payment confirmation and grant the plan's credits. Idempotent
/// per (order_id, payment_id).
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppJson(req): AppJson<VerifyPaymentRequest>,
) -> Result<Json<JSend<VerifyPaymentResponse>>, ApiError> {
    let credits = payments::confirm_payment(
        &state.db,
        &state.config.payment.key_secret,
        identity.owner_id(),
        &req.order_id,
        &req.payment_id,
        &req.signature,
        &req.plan_id,
    )?;

    Ok(JSend::success(VerifyPaymentResponse { credits }))
}

pub async fn my_payments(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<JSend<Vec<TransactionResponse>>>, ApiError> {
    let transactions = state
        .db
        .get_transactions_by_owner(identity.owner_id())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(JSend::success(
        transactions.iter().map(tx_to_response).collect(),
    ))
}

pub async fn all_payments(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<JSend<Vec<TransactionResponse>>>, ApiError> {
    require_admin_key(&state, &headers)?;

    let transactions = state
        .db
        .get_all_transactions()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(JSend::success(
        transactions.iter().map(tx_to_response).collect(),
    ))
}

fn tx_to_response(tx: &PaymentTransaction) -> TransactionResponse {
    TransactionResponse {
        owner_id: tx.owner_id.clone(),
        order_id: tx.order_id.clone(),
        payment_id: tx.payment_id.clone(),
        plan_id: tx.plan_id.clone(),
        credits_added: tx.credits_added,
        amount: tx.amount,
        status: tx.status.clone(),
        created_at: tx.created_at.to_rfc3339(),
    }
}
