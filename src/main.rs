use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloudstash::{
    api,
    auth::{DecodeOnlyVerifier, Hs256Verifier, TokenVerifier},
    config::{AuthMode, Config},
    object_store as obj,
    object_store::StorageKind,
    payments::Gateway,
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "cloudstash starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db = Database::open(&config.data_dir)?;
    info!("Database opened at: {}", config.data_dir);

    // Initialize object store backend
    let object_store: Arc<dyn obj::ObjectStore> = match config.storage.backend {
        StorageKind::Local => {
            let store = obj::LocalStore::new(&config.storage.local_storage_path)?;
            info!(
                "Using local storage backend at: {}",
                config.storage.local_storage_path
            );
            Arc::new(store)
        }
        StorageKind::Blob => {
            let store = obj::BlobStore::open(&config.data_dir)
                .map_err(|e| anyhow::anyhow!("Failed to open blob store: {e}"))?;
            info!("Using database-blob storage backend");
            Arc::new(store)
        }
        StorageKind::S3 => {
            let bucket = config
                .storage
                .s3_bucket
                .as_deref()
                .expect("S3_BUCKET validated in config");
            let access_key = config
                .storage
                .s3_access_key
                .as_deref()
                .expect("AWS_ACCESS_KEY_ID validated in config");
            let secret_key = config
                .storage
                .s3_secret_key
                .as_deref()
                .expect("AWS_SECRET_ACCESS_KEY validated in config");
            let store = obj::S3Store::new(
                bucket,
                &config.storage.s3_region,
                access_key,
                secret_key,
                config.storage.s3_endpoint.as_deref(),
            )?;
            info!("Using S3 storage backend, bucket: {}", bucket);
            Arc::new(store)
        }
    };

    // Token verification
    let verifier: Arc<dyn TokenVerifier> = match config.auth.mode {
        AuthMode::Verify => {
            let secret = config
                .auth
                .jwt_secret
                .as_deref()
                .expect("AUTH_JWT_SECRET validated in config");
            Arc::new(Hs256Verifier::new(secret))
        }
        AuthMode::Decode => {
            tracing::warn!("AUTH_MODE=decode — bearer tokens are NOT verified");
            Arc::new(DecodeOnlyVerifier)
        }
    };

    let gateway = Gateway::new(
        &config.payment.api_url,
        &config.payment.key_id,
        &config.payment.key_secret,
    );

    // Create shared state
    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState {
        config,
        db,
        object_store,
        verifier,
        gateway,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on: {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
