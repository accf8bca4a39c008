//! Chain and matched-transaction types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Source chain a deposit arrives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Bitcoin,
    Litecoin,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bitcoin",
            Chain::Litecoin => "litecoin",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Chain::Bitcoin),
            "litecoin" | "ltc" => Ok(Chain::Litecoin),
            _ => Err(format!("unknown chain: {}", s)),
        }
    }
}

/// One P2PKH output seen on chain, handed to the transaction handler.
///
/// Values are integer minor units (satoshi / litoshi). The rail dedups on
/// `(hash, to_address)`; `output_index` only disambiguates outputs for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Chain transaction id (hex)
    pub hash: String,
    /// Output index within the transaction
    pub output_index: u32,
    /// Amount in the source chain's smallest unit
    pub value_minor_units: u64,
    /// Decoded P2PKH address the output pays
    pub to_address: String,
}
