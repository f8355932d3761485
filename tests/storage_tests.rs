use chrono::Utc;
use cloudstash::object_store::StorageKind;
use cloudstash::storage::models::{FileRecord, PaymentTransaction, INITIAL_CREDITS, INITIAL_PLAN};
use cloudstash::storage::{Database, DatabaseError};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_file(id: &str, owner_id: &str) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        storage_key: format!("uploads/{owner_id}/{id}.png"),
        backend: StorageKind::Local,
        name: format!("{id}.png"),
        byte_size: 1024,
        mime_type: "image/png".to_string(),
        is_public: false,
        created_at: Utc::now(),
    }
}

fn sample_transaction(owner_id: &str, order_id: &str, payment_id: &str) -> PaymentTransaction {
    PaymentTransaction {
        owner_id: owner_id.to_string(),
        order_id: order_id.to_string(),
        payment_id: payment_id.to_string(),
        plan_id: "premium".to_string(),
        credits_added: 500,
        amount: 50_000,
        status: "success".to_string(),
        created_at: Utc::now(),
    }
}

// ============================================================================
// File records
// ============================================================================

#[test]
fn test_put_and_get_file() {
    let (_dir, db) = test_db();
    let file = sample_file("file-1", "user-1");

    db.put_file(&file).unwrap();

    let retrieved = db.get_file("file-1").unwrap().expect("file should exist");
    assert_eq!(retrieved.id, "file-1");
    assert_eq!(retrieved.owner_id, "user-1");
    assert_eq!(retrieved.storage_key, "uploads/user-1/file-1.png");
    assert_eq!(retrieved.backend, StorageKind::Local);
    assert_eq!(retrieved.mime_type, "image/png");
    assert!(!retrieved.is_public);
}

#[test]
fn test_get_file_not_found() {
    let (_dir, db) = test_db();
    assert!(db.get_file("nonexistent").unwrap().is_none());
}

#[test]
fn test_get_files_by_owner() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("a", "user-1")).unwrap();
    db.put_file(&sample_file("b", "user-1")).unwrap();
    db.put_file(&sample_file("c", "user-2")).unwrap();

    let user1_files = db.get_files_by_owner("user-1").unwrap();
    assert_eq!(user1_files.len(), 2);

    let user2_files = db.get_files_by_owner("user-2").unwrap();
    assert_eq!(user2_files.len(), 1);
    assert_eq!(user2_files[0].id, "c");

    assert!(db.get_files_by_owner("nobody").unwrap().is_empty());
}

#[test]
fn test_delete_file() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("del-1", "user-1")).unwrap();
    db.put_file(&sample_file("keep-1", "user-1")).unwrap();

    assert!(db.delete_file("del-1").unwrap());
    assert!(db.get_file("del-1").unwrap().is_none());

    // Owner index no longer lists the deleted file
    let remaining = db.get_files_by_owner("user-1").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "keep-1");
}

#[test]
fn test_delete_file_not_found() {
    let (_dir, db) = test_db();
    assert!(!db.delete_file("nonexistent").unwrap());
}

#[test]
fn test_delete_last_file_removes_owner_entry() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("only", "user-solo")).unwrap();

    db.delete_file("only").unwrap();

    assert!(db.get_files_by_owner("user-solo").unwrap().is_empty());
}

#[test]
fn test_set_file_visibility() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("vis-1", "user-1")).unwrap();

    let updated = db
        .set_file_visibility("vis-1", true)
        .unwrap()
        .expect("file should exist");
    assert!(updated.is_public);

    let retrieved = db.get_file("vis-1").unwrap().unwrap();
    assert!(retrieved.is_public);

    let back = db.set_file_visibility("vis-1", false).unwrap().unwrap();
    assert!(!back.is_public);
}

#[test]
fn test_set_file_visibility_not_found() {
    let (_dir, db) = test_db();
    assert!(db
        .set_file_visibility("nonexistent", true)
        .unwrap()
        .is_none());
}

#[test]
fn test_set_file_size() {
    let (_dir, db) = test_db();
    let mut file = sample_file("size-1", "user-1");
    file.byte_size = 0;
    db.put_file(&file).unwrap();

    assert!(db.set_file_size("size-1", 4096).unwrap());
    assert_eq!(db.get_file("size-1").unwrap().unwrap().byte_size, 4096);

    assert!(!db.set_file_size("nonexistent", 4096).unwrap());
}

// ============================================================================
// Credit ledger
// ============================================================================

#[test]
fn test_ensure_credits_initial_grant() {
    let (_dir, db) = test_db();

    let balance = db.ensure_credits("user-1").unwrap();
    assert_eq!(balance.credits, INITIAL_CREDITS);
    assert_eq!(balance.plan, INITIAL_PLAN);
    assert_eq!(balance.owner_id, "user-1");
}

#[test]
fn test_ensure_credits_idempotent() {
    let (_dir, db) = test_db();

    db.ensure_credits("user-1").unwrap();
    db.debit_credits("user-1", 5).unwrap();

    // Repeated ensure calls never re-grant
    let balance = db.ensure_credits("user-1").unwrap();
    assert_eq!(balance.credits, INITIAL_CREDITS - 5);
}

#[test]
fn test_get_credits_missing() {
    let (_dir, db) = test_db();
    assert!(db.get_credits("never-seen").unwrap().is_none());
}

#[test]
fn test_debit_credits() {
    let (_dir, db) = test_db();
    db.ensure_credits("user-1").unwrap();

    let balance = db.debit_credits("user-1", 1).unwrap();
    assert_eq!(balance.credits, INITIAL_CREDITS - 1);
}

#[test]
fn test_debit_credits_insufficient() {
    let (_dir, db) = test_db();
    db.ensure_credits("user-1").unwrap();

    let result = db.debit_credits("user-1", INITIAL_CREDITS + 1);
    assert!(matches!(
        result,
        Err(DatabaseError::InsufficientCredits { have, need })
            if have == INITIAL_CREDITS && need == INITIAL_CREDITS + 1
    ));

    // A failed debit leaves the balance untouched
    let balance = db.get_credits("user-1").unwrap().unwrap();
    assert_eq!(balance.credits, INITIAL_CREDITS);
}

#[test]
fn test_debit_credits_unknown_owner() {
    let (_dir, db) = test_db();
    let result = db.debit_credits("never-seen", 1);
    assert!(matches!(
        result,
        Err(DatabaseError::InsufficientCredits { have: 0, need: 1 })
    ));
}

#[test]
fn test_debit_to_exactly_zero() {
    let (_dir, db) = test_db();
    db.ensure_credits("user-1").unwrap();

    let balance = db.debit_credits("user-1", INITIAL_CREDITS).unwrap();
    assert_eq!(balance.credits, 0);

    assert!(db.debit_credits("user-1", 1).is_err());
}

#[test]
fn test_credit_credits() {
    let (_dir, db) = test_db();
    db.ensure_credits("user-1").unwrap();

    let balance = db.credit_credits("user-1", 500, None).unwrap();
    assert_eq!(balance.credits, INITIAL_CREDITS + 500);
    assert_eq!(balance.plan, INITIAL_PLAN);
}

#[test]
fn test_credit_credits_upserts_missing_balance() {
    let (_dir, db) = test_db();

    // Payment lands before the owner ever touched the credits endpoint
    let balance = db.credit_credits("fresh-user", 500, None).unwrap();
    assert_eq!(balance.credits, INITIAL_CREDITS + 500);
}

#[test]
fn test_credit_credits_updates_plan() {
    let (_dir, db) = test_db();
    db.ensure_credits("user-1").unwrap();

    let balance = db.credit_credits("user-1", 500, Some("PREMIUM")).unwrap();
    assert_eq!(balance.plan, "PREMIUM");
}

// ============================================================================
// Payment transactions
// ============================================================================

#[test]
fn test_record_transaction() {
    let (_dir, db) = test_db();
    let tx = sample_transaction("user-1", "order_1", "pay_1");

    assert!(db.record_transaction(&tx).unwrap());

    let recorded = db.get_transactions_by_owner("user-1").unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].order_id, "order_1");
    assert_eq!(recorded[0].credits_added, 500);
}

#[test]
fn test_record_transaction_duplicate_rejected() {
    let (_dir, db) = test_db();
    let tx = sample_transaction("user-1", "order_1", "pay_1");

    assert!(db.record_transaction(&tx).unwrap());
    assert!(!db.record_transaction(&tx).unwrap());

    assert_eq!(db.get_transactions_by_owner("user-1").unwrap().len(), 1);
}

#[test]
fn test_same_order_different_payment_is_distinct() {
    let (_dir, db) = test_db();

    assert!(db
        .record_transaction(&sample_transaction("user-1", "order_1", "pay_1"))
        .unwrap());
    assert!(db
        .record_transaction(&sample_transaction("user-1", "order_1", "pay_2"))
        .unwrap());

    assert_eq!(db.get_all_transactions().unwrap().len(), 2);
}

#[test]
fn test_get_transactions_by_owner_filters() {
    let (_dir, db) = test_db();
    db.record_transaction(&sample_transaction("user-1", "o1", "p1"))
        .unwrap();
    db.record_transaction(&sample_transaction("user-2", "o2", "p2"))
        .unwrap();

    let user1 = db.get_transactions_by_owner("user-1").unwrap();
    assert_eq!(user1.len(), 1);
    assert_eq!(user1[0].owner_id, "user-1");

    assert!(db.get_transactions_by_owner("user-3").unwrap().is_empty());
}

// ============================================================================
// Profiles
// ============================================================================

#[test]
fn test_upsert_and_get_profile() {
    let (_dir, db) = test_db();
    db.upsert_profile("user-1", "a@example.com", Some("Test"), None, None)
        .unwrap();

    let profile = db.get_profile("user-1").unwrap().expect("profile exists");
    assert_eq!(profile.email, "a@example.com");
    assert_eq!(profile.first_name, Some("Test".to_string()));
    assert_eq!(profile.last_name, None);
}

#[test]
fn test_upsert_profile_preserves_created_at() {
    let (_dir, db) = test_db();
    let original = db
        .upsert_profile("user-1", "a@example.com", None, None, None)
        .unwrap();

    let updated = db
        .upsert_profile("user-1", "b@example.com", Some("New"), None, None)
        .unwrap();

    assert_eq!(updated.email, "b@example.com");
    assert_eq!(updated.created_at, original.created_at);
    assert!(updated.updated_at >= original.updated_at);
}

#[test]
fn test_delete_profile() {
    let (_dir, db) = test_db();
    db.upsert_profile("user-1", "a@example.com", None, None, None)
        .unwrap();

    assert!(db.delete_profile("user-1").unwrap());
    assert!(db.get_profile("user-1").unwrap().is_none());

    assert!(!db.delete_profile("user-1").unwrap());
}

// ============================================================================
// Purge
// ============================================================================

#[test]
fn test_purge_all() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("p1", "user-1")).unwrap();
    db.put_file(&sample_file("p2", "user-2")).unwrap();
    db.ensure_credits("user-1").unwrap();
    db.record_transaction(&sample_transaction("user-1", "o1", "p1"))
        .unwrap();
    db.upsert_profile("user-1", "a@example.com", None, None, None)
        .unwrap();

    let stats = db.purge_all().unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.balances, 1);
    assert_eq!(stats.transactions, 1);
    assert_eq!(stats.profiles, 1);

    assert!(db.get_all_files().unwrap().is_empty());
    assert!(db.get_credits("user-1").unwrap().is_none());
    assert!(db.get_all_transactions().unwrap().is_empty());
    assert!(db.get_files_by_owner("user-1").unwrap().is_empty());
}
