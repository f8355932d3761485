use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a file record and update the owner index
    pub fn put_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(!file.owner_id.is_empty(), "file owner must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            let mut owner_table = write_txn.open_table(OWNER_FILES)?;
            let mut file_ids: Vec<String> = owner_table
                .get(file.owner_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            if !file_ids.contains(&file.id) {
                file_ids.push(file.id.clone());
                let index_data = rmp_serde::to_vec_named(&file_ids)?;
                owner_table.insert(file.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get all files belonging to an owner
    pub fn get_files_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// Delete a file record by its UUID and clean up the owner index
    pub fn delete_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let owner_id: Option<String> = {
            let table = write_txn.open_table(FILES)?;
            let owner_id = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file.owner_id)
                }
                None => None,
            };
            owner_id
        };

        let deleted = match owner_id {
            Some(owner_id) => {
                {
                    let mut table = write_txn.open_table(FILES)?;
                    table.remove(id)?;
                }

                let file_ids: Option<Vec<String>> = {
                    let owner_table = write_txn.open_table(OWNER_FILES)?;
                    let ids = match owner_table.get(owner_id.as_str())? {
                        Some(data) => Some(rmp_serde::from_slice(data.value())?),
                        None => None,
                    };
                    ids
                };

                if let Some(mut ids) = file_ids {
                    ids.retain(|fid| fid != id);
                    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
                    if ids.is_empty() {
                        owner_table.remove(owner_id.as_str())?;
                    } else {
                        let new_data = rmp_serde::to_vec_named(&ids)?;
                        owner_table.insert(owner_id.as_str(), new_data.as_slice())?;
                    }
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Persist a file's visibility flag. Returns the updated record, or
    /// `None` when the file does not exist.
    pub fn set_file_visibility(
        &self,
        id: &str,
        is_public: bool,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = {
            let mut table = write_txn.open_table(FILES)?;
            let existing = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file)
                }
                None => None,
            };

            match existing {
                Some(mut file) => {
                    file.is_public = is_public;
                    let serialized = rmp_serde::to_vec_named(&file)?;
                    table.insert(id, serialized.as_slice())?;
                    Some(file)
                }
                None => None,
            }
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Backfill a file's byte size (some backends only learn it after the
    /// transfer completes).
    pub fn set_file_size(&self, id: &str, byte_size: u64) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = {
            let mut table = write_txn.open_table(FILES)?;
            let existing = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file)
                }
                None => None,
            };

            match existing {
                Some(mut file) => {
                    file.byte_size = byte_size;
                    let serialized = rmp_serde::to_vec_named(&file)?;
                    table.insert(id, serialized.as_slice())?;
                    true
                }
                None => false,
            }
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Get all files (test tooling)
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        Ok(files)
    }
}
