//! Storage Trait Definitions
//!
//! Persistence the listener and rail depend on. Implementations must make
//! `advance_cursor_if_greater` and `insert_processed_if_absent` atomic so
//! several listener instances can share one store.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AddressAssociation, Chain};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Cursor, association lookup and processed-transaction ledger
///
/// Implementations:
/// - `SqliteStore` - Production storage with SQLite
/// - `MemoryStore` - In-memory storage for testing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Highest fully processed block height; `0` means "start at the tip"
    async fn get_cursor(&self, chain: Chain) -> StorageResult<u64>;

    /// Persist `height` only if it is greater than the stored cursor
    async fn advance_cursor_if_greater(&self, chain: Chain, height: u64) -> StorageResult<()>;

    /// Look up the association for a deposit address
    async fn find_association(
        &self,
        chain: Chain,
        address: &str,
    ) -> StorageResult<Option<AddressAssociation>>;

    /// Record `(chain, tx_hash, address)` as processed.
    ///
    /// Returns `true` if the record already existed.
    async fn insert_processed_if_absent(
        &self,
        chain: Chain,
        tx_hash: &str,
        address: &str,
    ) -> StorageResult<bool>;
}

/// Association writes used by address provisioning
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Next unused derivation index for `chain`
    async fn next_address_index(&self, chain: Chain) -> StorageResult<u32>;

    /// Insert a new association; duplicate address or index is an error
    async fn insert_association(&self, association: &AddressAssociation) -> StorageResult<()>;
}
