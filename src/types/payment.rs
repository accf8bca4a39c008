//! Outbound payment requests

use serde::{Deserialize, Serialize};

use super::transaction::Chain;

/// Asset identifier on the destination ledger (e.g. "LTC")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetCode(String);

impl AssetCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Default asset code for a source chain
    pub fn for_chain(chain: Chain) -> Self {
        match chain {
            Chain::Bitcoin => Self::new("BTC"),
            Chain::Litecoin => Self::new("LTC"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment handed to the downstream queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub destination_account_key: String,
    pub asset_code: AssetCode,
    /// Decimal amount at the destination ledger's precision
    pub amount: String,
    /// Source chain transaction hash
    pub correlation_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_code_for_chain() {
        assert_eq!(AssetCode::for_chain(Chain::Litecoin).as_str(), "LTC");
        assert_eq!(AssetCode::for_chain(Chain::Bitcoin).as_str(), "BTC");
        assert_eq!(AssetCode::new("ltc"), AssetCode::for_chain(Chain::Litecoin));
    }
}
