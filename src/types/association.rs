//! Deposit address associations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transaction::Chain;

/// Binds one derived deposit address to one destination account.
///
/// Written once by provisioning, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAssociation {
    pub chain: Chain,
    /// Derivation index used to create `address`
    pub address_index: u32,
    pub address: String,
    /// Account on the destination ledger that receives the payment
    pub destination_account_key: String,
    pub created_at: DateTime<Utc>,
}

impl AddressAssociation {
    pub fn new(
        chain: Chain,
        address_index: u32,
        address: String,
        destination_account_key: String,
    ) -> Self {
        Self {
            chain,
            address_index,
            address,
            destination_account_key,
            created_at: Utc::now(),
        }
    }
}
