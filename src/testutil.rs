//! Shared test helpers. Builds a fully wired [`AppState`] on throwaway
//! directories so handler-level tests don't repeat the setup.

use std::path::Path;
use std::sync::Arc;

use crate::auth::DecodeOnlyVerifier;
use crate::config::{AuthConfig, AuthMode, Config, PaymentConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::payments::Gateway;
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState rooted at `root` (typically a tempdir), with a
/// fresh database and a local object store.
pub fn test_state(root: &Path) -> Arc<AppState> {
    let data_dir = root.join("data");
    let files_dir = root.join("files");

    let config = Config {
        bind_address: "127.0.0.1:0".to_string(),
        data_dir: data_dir.to_string_lossy().to_string(),
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
            ..StorageConfig::default()
        },
        auth: AuthConfig {
            mode: AuthMode::Decode,
            jwt_secret: None,
        },
        payment: PaymentConfig {
            key_id: "rzp_test_dummykey".to_string(),
            key_secret: "testsecret".to_string(),
            api_url: "http://127.0.0.1:1/v1".to_string(),
        },
        webhook_secret: Some("whsec_test".to_string()),
        admin_api_key: Some("test-admin-key".to_string()),
        production: false,
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
        max_batch_files: 10,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(&files_dir).expect("Failed to create test object store");
    let gateway = Gateway::new(
        &config.payment.api_url,
        &config.payment.key_id,
        &config.payment.key_secret,
    );

    Arc::new(AppState {
        config,
        db,
        object_store: Arc::new(object_store),
        verifier: Arc::new(DecodeOnlyVerifier),
        gateway,
    })
}
