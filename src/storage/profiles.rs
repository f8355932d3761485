use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::Profile;
use super::tables::PROFILES;

impl Database {
    // ========================================================================
    // Profiles (identity-provider cache)
    // ========================================================================

    pub fn get_profile(&self, owner_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PROFILES)?;

        match table.get(owner_id)? {
            Some(data) => {
                let profile: Profile = rmp_serde::from_slice(data.value())?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Create or refresh a profile from identity-provider data. `created_at`
    /// survives updates; everything else mirrors the provider.
    pub fn upsert_profile(
        &self,
        owner_id: &str,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<Profile, DatabaseError> {
        let now = Utc::now();
        let write_txn = self.begin_write()?;

        let profile = {
            let mut table = write_txn.open_table(PROFILES)?;
            let created_at = match table.get(owner_id)? {
                Some(data) => {
                    let existing: Profile = rmp_serde::from_slice(data.value())?;
                    existing.created_at
                }
                None => now,
            };

            let profile = Profile {
                owner_id: owner_id.to_string(),
                email: email.to_string(),
                first_name: first_name.map(|s| s.to_string()),
                last_name: last_name.map(|s| s.to_string()),
                image_url: image_url.map(|s| s.to_string()),
                created_at,
                updated_at: now,
            };

            let data = rmp_serde::to_vec_named(&profile)?;
            table.insert(owner_id, data.as_slice())?;
            profile
        };

        write_txn.commit()?;
        Ok(profile)
    }

    pub fn delete_profile(&self, owner_id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(PROFILES)?;
            let deleted = table.remove(owner_id)?.is_some();
            deleted
        };
        write_txn.commit()?;
        Ok(deleted)
    }
}
