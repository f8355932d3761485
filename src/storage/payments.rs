use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::PaymentTransaction;
use super::tables::TRANSACTIONS;

impl Database {
    // ========================================================================
    // Payment transactions
    // ========================================================================

    /// Record a confirmed payment. Returns `false` when a transaction with
    /// the same (order_id, payment_id) already exists -- the record is an
    /// immutable audit entry and replays must not grant twice.
    pub fn record_transaction(&self, tx: &PaymentTransaction) -> Result<bool, DatabaseError> {
        let key = PaymentTransaction::key(&tx.order_id, &tx.payment_id);

        let write_txn = self.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(TRANSACTIONS)?;
            if table.get(key.as_str())?.is_some() {
                false
            } else {
                let data = rmp_serde::to_vec_named(tx)?;
                table.insert(key.as_str(), data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;

        Ok(inserted)
    }

    /// All transactions belonging to an owner, oldest first by key order.
    pub fn get_transactions_by_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        Ok(self
            .get_all_transactions()?
            .into_iter()
            .filter(|tx| tx.owner_id == owner_id)
            .collect())
    }

    pub fn get_all_transactions(&self) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;

        let mut transactions = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let tx: PaymentTransaction = rmp_serde::from_slice(value.value())?;
            transactions.push(tx);
        }

        Ok(transactions)
    }
}
