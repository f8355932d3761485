use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use bytes::Bytes;
use cloudstash::api::handlers::{public_file, raw_file};
use cloudstash::api::response::ApiError;
use cloudstash::object_store::{LocalStore, ObjectStore, S3Store};
use cloudstash::payments::{confirm_payment, PaymentError};
use cloudstash::sharing::toggle_public;
use cloudstash::signing::payment_signature;
use cloudstash::storage::models::INITIAL_CREDITS;
use cloudstash::storage::Database;
use cloudstash::testutil::test_state;
use cloudstash::upload::{
    issue_upload_grant, register_upload, upload_batch, IncomingFile, UploadLimits, WorkflowError,
};

fn setup() -> (tempfile::TempDir, Database, LocalStore) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let store = LocalStore::new(dir.path().join("files")).unwrap();
    (dir, db, store)
}

fn limits() -> UploadLimits {
    UploadLimits {
        max_files: 10,
        max_bytes: 10 * 1024 * 1024,
    }
}

fn incoming(name: &str, data: &'static [u8]) -> IncomingFile {
    IncomingFile {
        name: name.to_string(),
        content_type: None,
        data: Bytes::from_static(data),
    }
}

/// Drain an owner down to exactly `target` credits.
fn set_balance(db: &Database, owner: &str, target: u64) {
    let balance = db.ensure_credits(owner).unwrap();
    db.debit_credits(owner, balance.credits - target).unwrap();
}

// ============================================================================
// Proxied batch uploads
// ============================================================================

#[tokio::test]
async fn test_upload_debits_one_credit_per_file() {
    let (_dir, db, store) = setup();
    set_balance(&db, "user-1", 5);

    let report = IncomingFile {
        name: "report.pdf".to_string(),
        content_type: Some("application/pdf".to_string()),
        data: Bytes::from(vec![b'x'; 1024]),
    };
    let outcome = upload_batch(&db, &store, "user-1", vec![report], limits())
        .await
        .unwrap();

    assert_eq!(outcome.files.len(), 1);
    assert_eq!(outcome.remaining_credits, 4);

    let record = &outcome.files[0];
    assert_eq!(record.name, "report.pdf");
    assert_eq!(record.byte_size, 1024);
    assert_eq!(record.mime_type, "application/pdf");
    assert!(!record.is_public, "uploads start private");

    // Record persisted and bytes are retrievable
    let stored = db.get_file(&record.id).unwrap().unwrap();
    assert_eq!(stored.owner_id, "user-1");
    assert!(store.exists(&record.storage_key).await.unwrap());
}

#[tokio::test]
async fn test_first_upload_gets_initial_grant() {
    let (_dir, db, store) = setup();

    let outcome = upload_batch(
        &db,
        &store,
        "fresh-user",
        vec![incoming("a.txt", b"hello")],
        limits(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.remaining_credits, INITIAL_CREDITS - 1);
}

#[tokio::test]
async fn test_batch_rejected_when_balance_cannot_cover_it() {
    let (_dir, db, store) = setup();
    set_balance(&db, "user-1", 1);

    let result = upload_batch(
        &db,
        &store,
        "user-1",
        vec![incoming("a.txt", b"aa"), incoming("b.txt", b"bb")],
        limits(),
    )
    .await;

    assert!(matches!(
        result,
        Err(WorkflowError::InsufficientCredits { have: 1, need: 2 })
    ));

    // All-or-nothing: nothing stored, nothing debited
    assert!(db.get_files_by_owner("user-1").unwrap().is_empty());
    assert_eq!(db.get_credits("user-1").unwrap().unwrap().credits, 1);
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let (_dir, db, store) = setup();

    let result = upload_batch(&db, &store, "user-1", vec![], limits()).await;
    assert!(matches!(result, Err(WorkflowError::NoFiles)));
}

#[tokio::test]
async fn test_batch_over_file_count_limit_rejected() {
    let (_dir, db, store) = setup();
    let small = UploadLimits {
        max_files: 1,
        max_bytes: 1024,
    };

    let result = upload_batch(
        &db,
        &store,
        "user-1",
        vec![incoming("a.txt", b"a"), incoming("b.txt", b"b")],
        small,
    )
    .await;

    assert!(matches!(
        result,
        Err(WorkflowError::TooManyFiles { count: 2, max: 1 })
    ));
    assert!(db.get_credits("user-1").unwrap().is_none());
}

#[tokio::test]
async fn test_oversized_file_rejected_before_any_debit() {
    let (_dir, db, store) = setup();
    let small = UploadLimits {
        max_files: 10,
        max_bytes: 4,
    };

    let result = upload_batch(
        &db,
        &store,
        "user-1",
        vec![incoming("big.bin", b"too large")],
        small,
    )
    .await;

    assert!(matches!(result, Err(WorkflowError::FileTooLarge { .. })));
    assert!(db.get_credits("user-1").unwrap().is_none());
}

// ============================================================================
// Direct-to-storage uploads
// ============================================================================

#[tokio::test]
async fn test_grant_issuance_debits_nothing() {
    let (_dir, db, _store) = setup();
    let s3 = S3Store::new("bucket", "us-east-1", "AKIDEXAMPLE", "secret", None).unwrap();
    db.ensure_credits("user-1").unwrap();

    let grant = issue_upload_grant(&s3, "user-1", "photo.png", "image/png", limits())
        .await
        .unwrap();

    assert!(grant.storage_key.starts_with("uploads/user-1/"));
    assert!(grant.fields.contains_key("policy"));

    let balance = db.get_credits("user-1").unwrap().unwrap();
    assert_eq!(balance.credits, INITIAL_CREDITS);
}

#[tokio::test]
async fn test_register_debits_exactly_one() {
    let (_dir, db, store) = setup();
    set_balance(&db, "user-1", 3);

    let (record, remaining) = register_upload(
        &db,
        &store,
        "user-1",
        "uploads/user-1/123-photo.png",
        "photo.png",
        "image/png",
        2048,
    )
    .await
    .unwrap();

    assert_eq!(remaining, 2);
    assert_eq!(record.byte_size, 2048);
    assert!(!record.is_public);
    assert!(db.get_file(&record.id).unwrap().is_some());
}

#[tokio::test]
async fn test_register_rejected_at_zero_balance() {
    let (_dir, db, store) = setup();
    set_balance(&db, "user-1", 0);

    let result = register_upload(
        &db,
        &store,
        "user-1",
        "uploads/user-1/123-a.txt",
        "a.txt",
        "text/plain",
        10,
    )
    .await;

    assert!(matches!(
        result,
        Err(WorkflowError::InsufficientCredits { have: 0, need: 1 })
    ));
    assert!(db.get_files_by_owner("user-1").unwrap().is_empty());
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn test_toggle_public_is_an_involution() {
    let (_dir, db, store) = setup();
    let outcome = upload_batch(
        &db,
        &store,
        "user-1",
        vec![incoming("doc.txt", b"contents")],
        limits(),
    )
    .await
    .unwrap();
    let file_id = outcome.files[0].id.clone();

    let public = toggle_public(&db, &store, &file_id, "user-1").await.unwrap();
    assert!(public.is_public);

    let private = toggle_public(&db, &store, &file_id, "user-1").await.unwrap();
    assert!(!private.is_public);
}

#[tokio::test]
async fn test_toggle_public_owner_only() {
    let (_dir, db, store) = setup();
    let outcome = upload_batch(
        &db,
        &store,
        "user-1",
        vec![incoming("doc.txt", b"contents")],
        limits(),
    )
    .await
    .unwrap();
    let file_id = outcome.files[0].id.clone();

    let result = toggle_public(&db, &store, &file_id, "intruder").await;
    assert!(matches!(result, Err(WorkflowError::NotAuthorized)));

    // Flag unchanged
    assert!(!db.get_file(&file_id).unwrap().unwrap().is_public);
}

#[tokio::test]
async fn test_toggle_public_missing_file() {
    let (_dir, db, store) = setup();
    let result = toggle_public(&db, &store, "no-such-id", "user-1").await;
    assert!(matches!(result, Err(WorkflowError::NotFound)));
}

fn fail_status(err: ApiError) -> StatusCode {
    match err {
        ApiError::Fail(code, _) => code,
        ApiError::Error(code, _) => code,
    }
}

#[tokio::test]
async fn test_private_file_hidden_until_toggled_public() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let outcome = upload_batch(
        &state.db,
        state.object_store.as_ref(),
        "user-1",
        vec![incoming("notes.txt", b"private notes")],
        limits(),
    )
    .await
    .unwrap();
    let file_id = outcome.files[0].id.clone();

    // Private: public metadata treats the file as missing
    let err = public_file(State(Arc::clone(&state)), Path(file_id.clone()))
        .await
        .unwrap_err();
    assert_eq!(fail_status(err), StatusCode::NOT_FOUND);

    // Private: raw content is refused outright
    let err = raw_file(State(Arc::clone(&state)), Path(file_id.clone()))
        .await
        .unwrap_err();
    assert_eq!(fail_status(err), StatusCode::FORBIDDEN);

    toggle_public(&state.db, state.object_store.as_ref(), &file_id, "user-1")
        .await
        .unwrap();

    // Public: metadata is served
    let resp = public_file(State(Arc::clone(&state)), Path(file_id.clone()))
        .await
        .unwrap();
    assert_eq!(resp.0.data.id, file_id);
    assert!(resp.0.data.is_public);

    // Public: raw bytes stream inline
    let resp = raw_file(State(Arc::clone(&state)), Path(file_id))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
}

#[tokio::test]
async fn test_backend_mismatch_rejected() {
    let (_dir, db, store) = setup();
    let outcome = upload_batch(
        &db,
        &store,
        "user-1",
        vec![incoming("doc.txt", b"contents")],
        limits(),
    )
    .await
    .unwrap();
    let file_id = outcome.files[0].id.clone();

    // Same record, different active backend
    let s3 = S3Store::new("bucket", "us-east-1", "AKIDEXAMPLE", "secret", None).unwrap();
    let result = toggle_public(&db, &s3, &file_id, "user-1").await;
    assert!(matches!(
        result,
        Err(WorkflowError::UnsupportedStorage { .. })
    ));
}

// ============================================================================
// Payment confirmation
// ============================================================================

const KEY_SECRET: &str = "test_key_secret";

#[test]
fn test_confirm_payment_grants_plan_credits() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    db.ensure_credits("user-1").unwrap();

    let signature = payment_signature(KEY_SECRET, "order_1", "pay_1");
    let credits = confirm_payment(
        &db, KEY_SECRET, "user-1", "order_1", "pay_1", &signature, "premium",
    )
    .unwrap();

    assert_eq!(credits, INITIAL_CREDITS + 500);
    assert_eq!(db.get_transactions_by_owner("user-1").unwrap().len(), 1);
}

#[test]
fn test_confirm_payment_tampered_signature() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    db.ensure_credits("user-1").unwrap();

    let signature = payment_signature(KEY_SECRET, "order_1", "pay_other");
    let result = confirm_payment(
        &db, KEY_SECRET, "user-1", "order_1", "pay_1", &signature, "premium",
    );

    assert!(matches!(result, Err(PaymentError::InvalidSignature)));

    // Nothing recorded, nothing granted
    assert!(db.get_all_transactions().unwrap().is_empty());
    assert_eq!(
        db.get_credits("user-1").unwrap().unwrap().credits,
        INITIAL_CREDITS
    );
}

#[test]
fn test_confirm_payment_unknown_plan() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();

    let signature = payment_signature(KEY_SECRET, "order_1", "pay_1");
    let result = confirm_payment(
        &db, KEY_SECRET, "user-1", "order_1", "pay_1", &signature, "mega",
    );

    assert!(matches!(result, Err(PaymentError::UnknownPlan(_))));
    assert!(db.get_all_transactions().unwrap().is_empty());
}

#[test]
fn test_confirm_payment_replay_grants_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    db.ensure_credits("user-1").unwrap();

    let signature = payment_signature(KEY_SECRET, "order_1", "pay_1");
    let first = confirm_payment(
        &db, KEY_SECRET, "user-1", "order_1", "pay_1", &signature, "premium",
    )
    .unwrap();
    assert_eq!(first, INITIAL_CREDITS + 500);

    // Replay: still succeeds, still reports the current balance, grants nothing
    let second = confirm_payment(
        &db, KEY_SECRET, "user-1", "order_1", "pay_1", &signature, "premium",
    )
    .unwrap();
    assert_eq!(second, INITIAL_CREDITS + 500);
    assert_eq!(db.get_all_transactions().unwrap().len(), 1);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_removes_record_and_bytes() {
    let (_dir, db, store) = setup();
    let outcome = upload_batch(
        &db,
        &store,
        "user-1",
        vec![incoming("gone.txt", b"bytes")],
        limits(),
    )
    .await
    .unwrap();
    let record = &outcome.files[0];

    store.delete(&record.storage_key).await.unwrap();
    assert!(db.delete_file(&record.id).unwrap());

    assert!(db.get_file(&record.id).unwrap().is_none());
    assert!(!store.exists(&record.storage_key).await.unwrap());
}
