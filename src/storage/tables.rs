use redb::TableDefinition;

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Owner index: owner id -> msgpack Vec of file UUIDs
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");

/// Credit balances: owner id -> CreditBalance (msgpack)
pub const CREDITS: TableDefinition<&str, &[u8]> = TableDefinition::new("credits");

/// Payment audit records: "order_id|payment_id" -> PaymentTransaction (msgpack).
/// The composite key is what makes confirmations idempotent.
pub const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Identity-provider profile cache: owner id -> Profile (msgpack)
pub const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");
