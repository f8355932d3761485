use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Batch bodies can carry up to max_batch_files files plus form overhead.
    let batch_limit =
        state.config.max_upload_size as usize * state.config.max_batch_files + 1024 * 1024;

    let mut router = Router::new()
        // Files
        .route(
            "/files/upload",
            post(handlers::upload_files).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .route("/files/presigned-url", post(handlers::presigned_url))
        .route("/files/register-file", post(handlers::register_file))
        .route("/files/my", get(handlers::my_files))
        .route("/files/public/:id", get(handlers::public_file))
        .route("/files/download/:id", get(handlers::download_file))
        .route("/files/raw/:id", get(handlers::raw_file))
        .route("/files/view/:id", get(handlers::view_file))
        .route("/files/:id", delete(handlers::delete_file))
        .route("/files/:id/toggle-public", patch(handlers::toggle_public))
        // Aliases kept for older clients of the direct-upload flow
        .route("/upload/presigned-url", post(handlers::presigned_url))
        .route("/upload/confirm", post(handlers::register_file))
        // Credits
        .route("/users/credits", get(handlers::get_credits))
        .route("/users/add-credits", post(handlers::add_credits))
        // Payments
        .route("/payments/create-order", post(handlers::create_order))
        .route("/payments/verify-payment", post(handlers::verify_payment))
        .route("/payments/my", get(handlers::my_payments))
        .route("/payments/all", get(handlers::all_payments))
        // Webhooks
        .route("/webhooks/clerk", post(handlers::clerk_webhook))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled — purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
