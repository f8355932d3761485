//! cloudstash - a credit-metered file-sharing API
//!
//! Users upload files to one of three interchangeable storage backends
//! (local disk, database blobs, S3-compatible object storage), control
//! per-file visibility, and spend one credit per stored file. Payment
//! confirmations top balances back up. The crate provides:
//! - Swappable object storage behind one trait, including presigned
//!   direct-to-storage uploads
//! - redb embedded database for metadata, balances, and payment audit
//!   records (ACID, MVCC, crash-safe)
//! - Pluggable bearer-token verification
//! - REST API with multipart upload support

pub mod api;
pub mod auth;
pub mod config;
pub mod object_store;
pub mod payments;
pub mod sharing;
pub mod signing;
pub mod storage;
pub mod testutil;
pub mod upload;

use std::sync::Arc;

use auth::TokenVerifier;
use config::Config;
use payments::Gateway;
use storage::Database;
use upload::UploadLimits;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub gateway: Gateway,
}

impl AppState {
    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_files: self.config.max_batch_files,
            max_bytes: self.config.max_upload_size,
        }
    }
}
