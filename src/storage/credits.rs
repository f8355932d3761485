use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{CreditBalance, INITIAL_CREDITS, INITIAL_PLAN};
use super::tables::CREDITS;

impl Database {
    // ========================================================================
    // Credit ledger
    // ========================================================================

    /// Fetch an owner's balance, lazily creating one with the starting grant
    /// on first access. Idempotent: repeated calls without intervening
    /// debits/credits return the same balance.
    pub fn ensure_credits(&self, owner_id: &str) -> Result<CreditBalance, DatabaseError> {
        if let Some(balance) = self.get_credits(owner_id)? {
            return Ok(balance);
        }

        let balance = CreditBalance {
            owner_id: owner_id.to_string(),
            credits: INITIAL_CREDITS,
            plan: INITIAL_PLAN.to_string(),
        };

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDITS)?;
            // Another request may have initialized the balance between the
            // read above and this write; keep the existing record.
            if table.get(owner_id)?.is_none() {
                let data = rmp_serde::to_vec_named(&balance)?;
                table.insert(owner_id, data.as_slice())?;
            }
        }
        write_txn.commit()?;

        Ok(self
            .get_credits(owner_id)?
            .expect("balance written in this transaction"))
    }

    pub fn get_credits(&self, owner_id: &str) -> Result<Option<CreditBalance>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CREDITS)?;

        match table.get(owner_id)? {
            Some(data) => {
                let balance: CreditBalance = rmp_serde::from_slice(data.value())?;
                Ok(Some(balance))
            }
            None => Ok(None),
        }
    }

    /// Conditionally debit `n` credits. The check and the decrement happen
    /// inside one write transaction, so concurrent debits serialize and the
    /// balance can never go negative. A failed debit leaves the stored
    /// balance untouched.
    pub fn debit_credits(&self, owner_id: &str, n: u64) -> Result<CreditBalance, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = {
            let mut table = write_txn.open_table(CREDITS)?;
            let mut balance: CreditBalance = match table.get(owner_id)? {
                Some(data) => rmp_serde::from_slice(data.value())?,
                None => {
                    return Err(DatabaseError::InsufficientCredits { have: 0, need: n });
                }
            };

            if balance.credits < n {
                return Err(DatabaseError::InsufficientCredits {
                    have: balance.credits,
                    need: n,
                });
            }

            balance.credits -= n;
            let data = rmp_serde::to_vec_named(&balance)?;
            table.insert(owner_id, data.as_slice())?;
            balance
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Credit `n` to an owner's balance, creating the record if none exists
    /// (webhook and payment paths must not fail on first contact). An
    /// upserted balance starts from the grant amount before the credit.
    pub fn credit_credits(
        &self,
        owner_id: &str,
        n: u64,
        plan: Option<&str>,
    ) -> Result<CreditBalance, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = {
            let mut table = write_txn.open_table(CREDITS)?;
            let mut balance: CreditBalance = match table.get(owner_id)? {
                Some(data) => rmp_serde::from_slice(data.value())?,
                None => CreditBalance {
                    owner_id: owner_id.to_string(),
                    credits: INITIAL_CREDITS,
                    plan: INITIAL_PLAN.to_string(),
                },
            };

            balance.credits += n;
            if let Some(plan) = plan {
                balance.plan = plan.to_string();
            }

            let data = rmp_serde::to_vec_named(&balance)?;
            table.insert(owner_id, data.as_slice())?;
            balance
        };

        write_txn.commit()?;
        Ok(updated)
    }
}
