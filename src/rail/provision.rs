//! Deposit address provisioning
//!
//! Allocates the next derivation index for a chain, derives the address and
//! stores the association the rail later looks up.

use thiserror::Error;

use crate::address::{AddressError, AddressGenerator};
use crate::storage::{AssociationStore, StorageError};
use crate::types::{AddressAssociation, Chain};

/// Attempts before giving up when another provisioner takes the same index
const MAX_INDEX_ATTEMPTS: usize = 3;

/// Provisioning errors
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid destination account: {0}")]
    InvalidAccount(String),

    #[error("address derivation failed: {0}")]
    Address(#[from] AddressError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Create a new deposit address for `destination_account_key`
pub async fn provision_address(
    storage: &dyn AssociationStore,
    generator: &AddressGenerator,
    chain: Chain,
    destination_account_key: &str,
) -> Result<AddressAssociation, ProvisionError> {
    let account = destination_account_key.trim();
    if account.is_empty() {
        return Err(ProvisionError::InvalidAccount("empty account key".to_string()));
    }

    let mut attempt = 0;
    loop {
        attempt += 1;

        let index = storage.next_address_index(chain).await?;
        let address = generator.generate(index)?;
        let association = AddressAssociation::new(chain, index, address, account.to_string());

        match storage.insert_association(&association).await {
            Ok(()) => {
                tracing::info!(
                    target: "bridge::provision",
                    chain = %chain,
                    index,
                    address = %association.address,
                    account = %association.destination_account_key,
                    "Deposit address provisioned"
                );
                return Ok(association);
            }
            Err(StorageError::Duplicate(address)) if attempt < MAX_INDEX_ATTEMPTS => {
                tracing::debug!(
                    target: "bridge::provision",
                    index,
                    %address,
                    "Index taken concurrently, retrying"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::LITECOIN_MAINNET;
    use crate::storage::{MemoryStore, Storage};

    const LTUB: &str = "Ltub2a4FZnwPC8BgtmxViN796Ec7K9z6AQKXKqUvu4daU9xuapPEkYBAHfWNzEwpFjd2sHwX9kCFPxyMuWTHHiizViuaa27t85DP5ezobRwbYPm";

    #[tokio::test]
    async fn test_provisions_sequential_indices() {
        let store = MemoryStore::new();
        let generator = AddressGenerator::new(LTUB, LITECOIN_MAINNET).unwrap();

        let first = provision_address(&store, &generator, Chain::Litecoin, "GA1")
            .await
            .unwrap();
        let second = provision_address(&store, &generator, Chain::Litecoin, "GA2")
            .await
            .unwrap();

        assert_eq!(first.address_index, 0);
        assert_eq!(first.address, "Lhd98J63jWM44tY8tcGPcvCdRDruDadyJj");
        assert_eq!(second.address_index, 1);

        let found = store
            .find_association(Chain::Litecoin, &first.address)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.destination_account_key, "GA1");
    }

    #[tokio::test]
    async fn test_rejects_empty_account() {
        let store = MemoryStore::new();
        let generator = AddressGenerator::new(LTUB, LITECOIN_MAINNET).unwrap();

        assert!(matches!(
            provision_address(&store, &generator, Chain::Litecoin, "  ").await,
            Err(ProvisionError::InvalidAccount(_))
        ));
    }
}
