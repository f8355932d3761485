//! Payment confirmation workflow and the provider REST client.

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use crate::signing::{payment_signature, verify_signature};
use crate::storage::models::PaymentTransaction;
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),
    #[error("Payment provider error: {0}")]
    Provider(String),
    #[error("Database error: {0}")]
    Db(#[from] DatabaseError),
}

/// What a plan purchase grants and costs (amount in paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub credits: u64,
    pub amount: u64,
}

/// Fixed plan catalog.
pub fn plan(plan_id: &str) -> Option<Plan> {
    match plan_id {
        "premium" => Some(Plan {
            credits: 500,
            amount: 50_000,
        }),
        "ultimate" => Some(Plan {
            credits: 5_000,
            amount: 250_000,
        }),
        _ => None,
    }
}

// ============================================================================
// Provider client
// ============================================================================

/// Minimal payment-provider client: order creation only. Settlement and
/// capture are the provider's problem.
pub struct Gateway {
    client: reqwest::Client,
    api_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

impl Gateway {
    pub fn new(api_url: &str, key_id: &str, key_secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }

    /// Create an order with the provider. Amount is in the minor unit.
    pub async fn create_order(
        &self,
        amount: u64,
        currency: &str,
    ) -> Result<String, PaymentError> {
        let receipt = format!("rcpt_{}", Utc::now().timestamp_millis());
        let body = serde_json::json!({
            "amount": amount,
            "currency": currency,
            "receipt": receipt,
            "payment_capture": 1,
        });

        let resp = self
            .client
            .post(format!("{}/orders", self.api_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(format!(
                "order creation failed ({status}): {body}"
            )));
        }

        let order: OrderResponse = resp
            .json()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;
        Ok(order.id)
    }
}

// ============================================================================
// Confirmation
// ============================================================================

/// Verify a payment confirmation and grant the plan's credits.
///
/// The transaction record is keyed by (order_id, payment_id); a replayed
/// confirmation records nothing and grants nothing, and the current balance
/// is returned either way. This is the only path besides the initial grant
/// that increases a balance.
pub fn confirm_payment(
    db: &Database,
    key_secret: &str,
    owner_id: &str,
    order_id: &str,
    payment_id: &str,
    client_signature: &str,
    plan_id: &str,
) -> Result<u64, PaymentError> {
    let expected = payment_signature(key_secret, order_id, payment_id);
    if !verify_signature(&expected, client_signature) {
        return Err(PaymentError::InvalidSignature);
    }

    let plan = plan(plan_id).ok_or_else(|| PaymentError::UnknownPlan(plan_id.to_string()))?;

    let tx = PaymentTransaction {
        owner_id: owner_id.to_string(),
        order_id: order_id.to_string(),
        payment_id: payment_id.to_string(),
        plan_id: plan_id.to_string(),
        credits_added: plan.credits,
        amount: plan.amount,
        status: "success".to_string(),
        created_at: Utc::now(),
    };

    let inserted = db.record_transaction(&tx)?;
    if inserted {
        let balance = db.credit_credits(owner_id, plan.credits, None)?;
        tracing::info!(
            owner = %owner_id,
            order = %order_id,
            credits = plan.credits,
            "Payment confirmed"
        );
        Ok(balance.credits)
    } else {
        tracing::warn!(order = %order_id, payment = %payment_id, "Replayed payment confirmation ignored");
        let balance = db.ensure_credits(owner_id)?;
        Ok(balance.credits)
    }
}
