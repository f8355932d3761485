//! Visibility control: the public/private flag and its backend ACL.

use crate::object_store::ObjectStore;
use crate::storage::models::FileRecord;
use crate::storage::Database;
use crate::upload::{ensure_backend, WorkflowError};

/// Flip a file's visibility. Owner-only.
///
/// The backend ACL update runs first; the metadata flag is persisted only
/// once the ACL change succeeded, so a failed ACL call leaves the file in
/// its previous state (fail closed). The reverse inconsistency -- ACL
/// changed but flag not saved -- is the smaller exposure and is accepted.
pub async fn toggle_public(
    db: &Database,
    store: &dyn ObjectStore,
    file_id: &str,
    owner_id: &str,
) -> Result<FileRecord, WorkflowError> {
    let file = db.get_file(file_id)?.ok_or(WorkflowError::NotFound)?;

    if file.owner_id != owner_id {
        return Err(WorkflowError::NotAuthorized);
    }
    ensure_backend(&file, store)?;

    let make_public = !file.is_public;
    store.set_visibility(&file.storage_key, make_public).await?;

    let updated = db
        .set_file_visibility(file_id, make_public)?
        .ok_or(WorkflowError::NotFound)?;

    tracing::debug!(file_id = %file_id, public = make_public, "Toggled visibility");
    Ok(updated)
}
