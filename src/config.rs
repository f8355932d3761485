use thiserror::Error;

use crate::object_store::StorageKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub data_dir: String,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    /// Secret for webhook signature checks. Verification is enforced only
    /// when `production` is set.
    pub webhook_secret: Option<String>,
    /// API key protecting the out-of-band credit grant and admin listings.
    pub admin_api_key: Option<String>,
    pub production: bool,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum per-file upload size in bytes
    pub max_upload_size: u64,
    /// Maximum files per proxied upload batch
    pub max_batch_files: usize,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageKind,
    /// Directory for the local storage backend
    pub local_storage_path: String,
    /// Settings for the S3 backend (required when backend is s3)
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    /// Custom endpoint for S3-compatible stores (path-style addressing)
    pub s3_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Cryptographically verify bearer tokens (production).
    Verify,
    /// Decode claims without verification (development only).
    Decode,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Local,
            local_storage_path: "./files".to_string(),
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key: None,
            s3_secret_key: None,
            s3_endpoint: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" => StorageKind::S3,
            "blob" => StorageKind::Blob,
            _ => StorageKind::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let auth_mode = match std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "verify".to_string())
            .to_lowercase()
            .as_str()
        {
            "decode" => AuthMode::Decode,
            _ => AuthMode::Verify,
        };

        let production = std::env::var("ENVIRONMENT")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let max_batch_files = std::env::var("MAX_BATCH_FILES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let config = Config {
            bind_address,
            data_dir,
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                s3_bucket: std::env::var("S3_BUCKET").ok(),
                s3_region: std::env::var("S3_REGION")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                s3_access_key: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                s3_secret_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                s3_endpoint: std::env::var("S3_ENDPOINT").ok(),
            },
            auth: AuthConfig {
                mode: auth_mode,
                jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            },
            payment: PaymentConfig {
                key_id: std::env::var("PAYMENT_KEY_ID")
                    .unwrap_or_else(|_| "rzp_test_dummykey".to_string()),
                key_secret: std::env::var("PAYMENT_KEY_SECRET")
                    .unwrap_or_else(|_| "dummysecret".to_string()),
                api_url: std::env::var("PAYMENT_API_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            },
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            production,
            test_mode,
            max_upload_size,
            max_batch_files,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageKind::S3 {
            if self.storage.s3_bucket.is_none() {
                return Err(ConfigError::ValidationError(
                    "S3_BUCKET is required when STORAGE_BACKEND=s3".to_string(),
                ));
            }
            if self.storage.s3_access_key.is_none() || self.storage.s3_secret_key.is_none() {
                return Err(ConfigError::ValidationError(
                    "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required when STORAGE_BACKEND=s3"
                        .to_string(),
                ));
            }
        }

        if self.auth.mode == AuthMode::Verify && self.auth.jwt_secret.is_none() {
            return Err(ConfigError::ValidationError(
                "AUTH_JWT_SECRET is required when AUTH_MODE=verify".to_string(),
            ));
        }

        if self.production && self.auth.mode == AuthMode::Decode {
            return Err(ConfigError::ValidationError(
                "AUTH_MODE=decode must not be used in production".to_string(),
            ));
        }

        if self.production && self.webhook_secret.is_none() {
            return Err(ConfigError::ValidationError(
                "WEBHOOK_SECRET is required in production".to_string(),
            ));
        }

        if self.test_mode && self.production {
            return Err(ConfigError::ValidationError(
                "TEST_MODE must not be enabled in production".to_string(),
            ));
        }

        if self.admin_api_key.is_none() {
            tracing::warn!(
                "ADMIN_API_KEY is not set; credit-grant and admin endpoints will reject all requests"
            );
        }

        Ok(())
    }
}
