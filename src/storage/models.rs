use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::object_store::StorageKind;

/// Plan a new balance starts on.
pub const INITIAL_PLAN: &str = "BASIC";

/// Credits granted when a balance is first created.
pub const INITIAL_CREDITS: u64 = 20;

/// A stored file's metadata record.
///
/// `storage_key` is only meaningful together with `backend`: keys are never
/// reinterpreted under a different backend than the one recorded here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// External identity-provider subject that owns this file.
    pub owner_id: String,
    pub storage_key: String,
    pub backend: StorageKind,
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-owner upload allowance. Never deleted; adjusted by debit-on-upload
/// and credit-on-payment. The unsigned type plus the conditional debit keep
/// it from ever going negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBalance {
    pub owner_id: String,
    pub credits: u64,
    pub plan: String,
}

/// Immutable audit record of a confirmed payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub owner_id: String,
    pub order_id: String,
    pub payment_id: String,
    pub plan_id: String,
    pub credits_added: u64,
    /// Amount charged, in the provider's minor unit (paise).
    pub amount: u64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// Composite key that makes confirmations idempotent per (order, payment).
    pub fn key(order_id: &str, payment_id: &str) -> String {
        format!("{order_id}|{payment_id}")
    }
}

/// Denormalized cache of identity-provider data. Never authoritative over
/// the provider itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub owner_id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
