//! In-Memory Storage
//!
//! Provides in-memory storage for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{AssociationStore, Storage, StorageError, StorageResult};
use crate::types::{AddressAssociation, Chain};

/// In-memory store
///
/// Each map sits behind its own lock; every conditional write holds the
/// write lock for the whole check-and-set.
#[derive(Clone, Default)]
pub struct MemoryStore {
    cursors: Arc<RwLock<HashMap<Chain, u64>>>,
    /// (chain, address) -> association
    associations: Arc<RwLock<HashMap<(Chain, String), AddressAssociation>>>,
    /// (chain, tx hash, address)
    processed: Arc<RwLock<HashSet<(Chain, String, String)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of processed-transaction records
    pub async fn processed_count(&self) -> usize {
        self.processed.read().await.len()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get_cursor(&self, chain: Chain) -> StorageResult<u64> {
        Ok(self.cursors.read().await.get(&chain).copied().unwrap_or(0))
    }

    async fn advance_cursor_if_greater(&self, chain: Chain, height: u64) -> StorageResult<()> {
        let mut cursors = self.cursors.write().await;
        let cursor = cursors.entry(chain).or_insert(0);
        if height > *cursor {
            *cursor = height;
        }
        Ok(())
    }

    async fn find_association(
        &self,
        chain: Chain,
        address: &str,
    ) -> StorageResult<Option<AddressAssociation>> {
        let associations = self.associations.read().await;
        Ok(associations.get(&(chain, address.to_string())).cloned())
    }

    async fn insert_processed_if_absent(
        &self,
        chain: Chain,
        tx_hash: &str,
        address: &str,
    ) -> StorageResult<bool> {
        let mut processed = self.processed.write().await;
        let inserted = processed.insert((chain, tx_hash.to_string(), address.to_string()));
        Ok(!inserted)
    }
}

#[async_trait]
impl AssociationStore for MemoryStore {
    async fn next_address_index(&self, chain: Chain) -> StorageResult<u32> {
        let associations = self.associations.read().await;
        let next = associations
            .values()
            .filter(|a| a.chain == chain)
            .map(|a| a.address_index + 1)
            .max()
            .unwrap_or(0);
        Ok(next)
    }

    async fn insert_association(&self, association: &AddressAssociation) -> StorageResult<()> {
        let mut associations = self.associations.write().await;

        let index_taken = associations
            .values()
            .any(|a| a.chain == association.chain && a.address_index == association.address_index);
        let key = (association.chain, association.address.clone());

        if index_taken || associations.contains_key(&key) {
            return Err(StorageError::Duplicate(association.address.clone()));
        }

        associations.insert(key, association.clone());
        Ok(())
    }
}
