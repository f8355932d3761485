use bytes::Bytes;
use cloudstash::object_store::{
    BlobStore, LocalStore, ObjectStore, ObjectStoreError, ReadHandle, StorageKind,
};

fn read_bytes(handle: ReadHandle) -> Bytes {
    match handle {
        ReadHandle::Bytes(b) => b,
        ReadHandle::Url(url) => panic!("expected inline bytes, got URL: {url}"),
    }
}

// ============================================================================
// Local backend
// ============================================================================

#[tokio::test]
async fn test_local_store_put_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let data = Bytes::from("hello world");
    store
        .put("test-key", data.clone(), "text/plain")
        .await
        .unwrap();

    let handle = store.resolve_read("test-key", false).await.unwrap();
    assert_eq!(read_bytes(handle), data);
}

#[tokio::test]
async fn test_local_store_kind() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();
    assert_eq!(store.kind(), StorageKind::Local);
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    assert!(!store.exists("missing").await.unwrap());

    store
        .put("present", Bytes::from("data"), "text/plain")
        .await
        .unwrap();
    assert!(store.exists("present").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .put("to-delete", Bytes::from("data"), "text/plain")
        .await
        .unwrap();
    assert!(store.exists("to-delete").await.unwrap());

    store.delete("to-delete").await.unwrap();
    assert!(!store.exists("to-delete").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    // Deleting a nonexistent key should not error
    store.delete("nonexistent").await.unwrap();
}

#[tokio::test]
async fn test_local_store_resolve_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.resolve_read("missing", false).await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .put("key", Bytes::from("first"), "text/plain")
        .await
        .unwrap();
    store
        .put("key", Bytes::from("second"), "text/plain")
        .await
        .unwrap();

    let handle = store.resolve_read("key", false).await.unwrap();
    assert_eq!(read_bytes(handle), Bytes::from("second"));
}

#[tokio::test]
async fn test_local_store_presign_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.presign_upload("key", "image/png", 1024).await;
    assert!(matches!(
        result,
        Err(ObjectStoreError::Unsupported(StorageKind::Local))
    ));
}

#[tokio::test]
async fn test_local_store_set_visibility_noop() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .put("key", Bytes::from("data"), "text/plain")
        .await
        .unwrap();

    // No per-object ACLs locally; both directions succeed
    store.set_visibility("key", true).await.unwrap();
    store.set_visibility("key", false).await.unwrap();
}

// ============================================================================
// Database-blob backend
// ============================================================================

#[tokio::test]
async fn test_blob_store_put_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    let data = Bytes::from("blob contents");
    store
        .put("blob-key", data.clone(), "application/pdf")
        .await
        .unwrap();

    let handle = store.resolve_read("blob-key", false).await.unwrap();
    assert_eq!(read_bytes(handle), data);
}

#[tokio::test]
async fn test_blob_store_kind() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    assert_eq!(store.kind(), StorageKind::Blob);
}

#[tokio::test]
async fn test_blob_store_exists_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    assert!(!store.exists("k").await.unwrap());

    store
        .put("k", Bytes::from("data"), "text/plain")
        .await
        .unwrap();
    assert!(store.exists("k").await.unwrap());

    store.delete("k").await.unwrap();
    assert!(!store.exists("k").await.unwrap());
}

#[tokio::test]
async fn test_blob_store_delete_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    store.delete("never-stored").await.unwrap();
}

#[tokio::test]
async fn test_blob_store_resolve_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    let result = store.resolve_read("missing", false).await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_blob_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    store
        .put("k", Bytes::from("first"), "text/plain")
        .await
        .unwrap();
    store
        .put("k", Bytes::from("second"), "text/plain")
        .await
        .unwrap();

    let handle = store.resolve_read("k", false).await.unwrap();
    assert_eq!(read_bytes(handle), Bytes::from("second"));
}

#[tokio::test]
async fn test_blob_store_presign_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    let result = store.presign_upload("key", "image/png", 1024).await;
    assert!(matches!(
        result,
        Err(ObjectStoreError::Unsupported(StorageKind::Blob))
    ));
}

#[tokio::test]
async fn test_blob_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = BlobStore::open(dir.path()).unwrap();
        store
            .put("persisted", Bytes::from("still here"), "text/plain")
            .await
            .unwrap();
    }

    let store = BlobStore::open(dir.path()).unwrap();
    let handle = store.resolve_read("persisted", false).await.unwrap();
    assert_eq!(read_bytes(handle), Bytes::from("still here"));
}
