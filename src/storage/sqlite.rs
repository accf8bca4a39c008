//! SQLite Persistent Storage
//!
//! Durable cursors, associations, processed-transaction ledger and the
//! outbound payment queue. Uses connection pooling via r2d2 for concurrent
//! access; the conditional writes are single statements so concurrent
//! listeners on the same database file stay consistent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::traits::{AssociationStore, Storage, StorageError, StorageResult};
use crate::queue::{PaymentQueue, QueueError};
use crate::types::{AddressAssociation, AssetCode, Chain, PaymentRequest};

/// Raw `address_associations` row
struct AssociationRow {
    chain: Chain,
    address_index: i64,
    address: String,
    destination_account_key: String,
    created_at: String,
}

impl AssociationRow {
    fn into_association(self) -> StorageResult<AddressAssociation> {
        let address_index = u32::try_from(self.address_index).map_err(|_| {
            StorageError::InvalidData(format!("address index out of range: {}", self.address_index))
        })?;

        Ok(AddressAssociation {
            chain: self.chain,
            address_index,
            address: self.address,
            destination_account_key: self.destination_account_key,
            created_at: SqliteStore::parse_timestamp(&self.created_at)?,
        })
    }
}

/// SQLite-backed store with connection pooling
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.busy_timeout(std::time::Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS block_cursors (
                chain TEXT PRIMARY KEY,
                height INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS address_associations (
                chain TEXT NOT NULL,
                address_index INTEGER NOT NULL,
                address TEXT NOT NULL,
                destination_account_key TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (chain, address),
                UNIQUE (chain, address_index)
            );

            CREATE TABLE IF NOT EXISTS processed_transactions (
                chain TEXT NOT NULL,
                transaction_hash TEXT NOT NULL,
                address TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                PRIMARY KEY (chain, transaction_hash, address)
            );

            CREATE TABLE IF NOT EXISTS payment_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                destination_account_key TEXT NOT NULL,
                asset_code TEXT NOT NULL,
                amount TEXT NOT NULL,
                correlation_id TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_payment_queue_correlation ON payment_queue(correlation_id);
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_association(chain: Chain, row: &rusqlite::Row) -> rusqlite::Result<AssociationRow> {
        Ok(AssociationRow {
            chain,
            address_index: row.get("address_index")?,
            address: row.get("address")?,
            destination_account_key: row.get("destination_account_key")?,
            created_at: row.get("created_at")?,
        })
    }

    fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::InvalidData(format!("bad timestamp {}: {}", value, e)))
    }

    // Synchronous helper methods for the trait implementations

    fn get_cursor_sync(&self, chain: Chain) -> StorageResult<u64> {
        let conn = self.conn()?;

        let height: Option<i64> = conn
            .query_row(
                "SELECT height FROM block_cursors WHERE chain = ?1",
                params![chain.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(height.unwrap_or(0) as u64)
    }

    fn advance_cursor_sync(&self, chain: Chain, height: u64) -> StorageResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO block_cursors (chain, height) VALUES (?1, ?2)
            ON CONFLICT(chain) DO UPDATE SET height = excluded.height
            WHERE excluded.height > block_cursors.height
            "#,
            params![chain.as_str(), height as i64],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn find_association_sync(
        &self,
        chain: Chain,
        address: &str,
    ) -> StorageResult<Option<AddressAssociation>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                "SELECT * FROM address_associations WHERE chain = ?1 AND address = ?2",
                params![chain.as_str(), address],
                |row| Self::row_to_association(chain, row),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        row.map(AssociationRow::into_association).transpose()
    }

    fn insert_processed_sync(
        &self,
        chain: Chain,
        tx_hash: &str,
        address: &str,
    ) -> StorageResult<bool> {
        let conn = self.conn()?;

        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO processed_transactions
                    (chain, transaction_hash, address, processed_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![chain.as_str(), tx_hash, address, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(inserted == 0)
    }

    fn next_address_index_sync(&self, chain: Chain) -> StorageResult<u32> {
        let conn = self.conn()?;

        let next: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(address_index) + 1, 0) FROM address_associations WHERE chain = ?1",
                params![chain.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        u32::try_from(next)
            .map_err(|_| StorageError::InvalidData(format!("address index overflow: {}", next)))
    }

    fn insert_association_sync(&self, association: &AddressAssociation) -> StorageResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO address_associations (
                chain, address_index, address, destination_account_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                association.chain.as_str(),
                association.address_index as i64,
                association.address,
                association.destination_account_key,
                association.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 1555 || err.extended_code == 2067 {
                    return StorageError::Duplicate(association.address.clone());
                }
            }
            StorageError::Database(e.to_string())
        })?;

        Ok(())
    }

    fn enqueue_sync(&self, request: &PaymentRequest) -> StorageResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO payment_queue (
                destination_account_key, asset_code, amount, correlation_id, enqueued_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                request.destination_account_key,
                request.asset_code.as_str(),
                request.amount,
                request.correlation_id,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    /// Payments currently in the queue table, oldest first
    pub fn pending_payments(&self) -> StorageResult<Vec<PaymentRequest>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT destination_account_key, asset_code, amount, correlation_id
                FROM payment_queue ORDER BY id ASC
                "#,
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let payments = stmt
            .query_map([], |row| {
                Ok(PaymentRequest {
                    destination_account_key: row.get(0)?,
                    asset_code: AssetCode::new(row.get::<_, String>(1)?),
                    amount: row.get(2)?,
                    correlation_id: row.get(3)?,
                })
            })
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(payments)
    }
}

#[async_trait]
impl Storage for SqliteStore {
    async fn get_cursor(&self, chain: Chain) -> StorageResult<u64> {
        self.get_cursor_sync(chain)
    }

    async fn advance_cursor_if_greater(&self, chain: Chain, height: u64) -> StorageResult<()> {
        self.advance_cursor_sync(chain, height)
    }

    async fn find_association(
        &self,
        chain: Chain,
        address: &str,
    ) -> StorageResult<Option<AddressAssociation>> {
        self.find_association_sync(chain, address)
    }

    async fn insert_processed_if_absent(
        &self,
        chain: Chain,
        tx_hash: &str,
        address: &str,
    ) -> StorageResult<bool> {
        self.insert_processed_sync(chain, tx_hash, address)
    }
}

#[async_trait]
impl AssociationStore for SqliteStore {
    async fn next_address_index(&self, chain: Chain) -> StorageResult<u32> {
        self.next_address_index_sync(chain)
    }

    async fn insert_association(&self, association: &AddressAssociation) -> StorageResult<()> {
        self.insert_association_sync(association)
    }
}

#[async_trait]
impl PaymentQueue for SqliteStore {
    async fn enqueue(&self, request: PaymentRequest) -> Result<(), QueueError> {
        Ok(self.enqueue_sync(&request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "Lhd98J63jWM44tY8tcGPcvCdRDruDadyJj";
    const TX_HASH: &str = "109fa1c369680c2f27643fdd160620d010851a376d25b9b00ef71afe789ea6ed";

    fn association(index: u32, address: &str) -> AddressAssociation {
        AddressAssociation::new(
            Chain::Litecoin,
            index,
            address.to_string(),
            "GDULKYRRVOMASFMXBYD4BYFRSHAKQDREEVVP2TMH2CER3DW2KATIOASB".to_string(),
        )
    }

    #[tokio::test]
    async fn test_cursor_starts_at_zero() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get_cursor(Chain::Litecoin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cursor_only_moves_forward() {
        let store = SqliteStore::in_memory().unwrap();

        store.advance_cursor_if_greater(Chain::Litecoin, 100).await.unwrap();
        store.advance_cursor_if_greater(Chain::Litecoin, 90).await.unwrap();
        assert_eq!(store.get_cursor(Chain::Litecoin).await.unwrap(), 100);

        store.advance_cursor_if_greater(Chain::Litecoin, 101).await.unwrap();
        assert_eq!(store.get_cursor(Chain::Litecoin).await.unwrap(), 101);

        // cursors are per chain
        assert_eq!(store.get_cursor(Chain::Bitcoin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_processed_if_absent() {
        let store = SqliteStore::in_memory().unwrap();

        let existed = store
            .insert_processed_if_absent(Chain::Litecoin, TX_HASH, ADDRESS)
            .await
            .unwrap();
        assert!(!existed);

        let existed = store
            .insert_processed_if_absent(Chain::Litecoin, TX_HASH, ADDRESS)
            .await
            .unwrap();
        assert!(existed);

        // a different address in the same transaction is a different key
        let existed = store
            .insert_processed_if_absent(Chain::Litecoin, TX_HASH, "LMy56RybHawcF2NKX9d2jnfuWd42Hn1AyX")
            .await
            .unwrap();
        assert!(!existed);
    }

    #[tokio::test]
    async fn test_association_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let record = association(0, ADDRESS);

        store.insert_association(&record).await.unwrap();

        let found = store
            .find_association(Chain::Litecoin, ADDRESS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.address_index, 0);
        assert_eq!(found.destination_account_key, record.destination_account_key);
        assert_eq!(found.created_at.timestamp(), record.created_at.timestamp());

        assert!(store
            .find_association(Chain::Bitcoin, ADDRESS)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_association() {
        let store = SqliteStore::in_memory().unwrap();

        store.insert_association(&association(0, ADDRESS)).await.unwrap();
        let result = store.insert_association(&association(1, ADDRESS)).await;

        assert!(matches!(result, Err(StorageError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_next_address_index() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.next_address_index(Chain::Litecoin).await.unwrap(), 0);

        store.insert_association(&association(0, ADDRESS)).await.unwrap();
        store
            .insert_association(&association(1, "LMy56RybHawcF2NKX9d2jnfuWd42Hn1AyX"))
            .await
            .unwrap();

        assert_eq!(store.next_address_index(Chain::Litecoin).await.unwrap(), 2);
        assert_eq!(store.next_address_index(Chain::Bitcoin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_payment_queue_table() {
        let store = SqliteStore::in_memory().unwrap();

        let request = PaymentRequest {
            destination_account_key: "GDULKYRRVOMASFMXBYD4BYFRSHAKQDREEVVP2TMH2CER3DW2KATIOASB"
                .to_string(),
            asset_code: AssetCode::new("LTC"),
            amount: "1.0000000".to_string(),
            correlation_id: TX_HASH.to_string(),
        };
        store.enqueue(request.clone()).await.unwrap();

        assert_eq!(store.pending_payments().unwrap(), vec![request]);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.advance_cursor_if_greater(Chain::Litecoin, 7).await.unwrap();
            store
                .insert_processed_if_absent(Chain::Litecoin, TX_HASH, ADDRESS)
                .await
                .unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.get_cursor(Chain::Litecoin).await.unwrap(), 7);
        assert!(store
            .insert_processed_if_absent(Chain::Litecoin, TX_HASH, ADDRESS)
            .await
            .unwrap());
    }
}
