//! Chain client interface and block data model

use async_trait::async_trait;
use bitcoin::ScriptBuf;
use thiserror::Error;

use crate::address::{encode_p2pkh, NetworkParams};
use crate::types::Transaction;

/// Chain client errors
#[derive(Debug, Error)]
pub enum ChainClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// A block as returned by the chain daemon, transactions in chain order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub hash: String,
    pub height: u64,
    pub transactions: Vec<ChainTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub txid: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Spent outpoint; both fields are `None` for coinbase inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub previous_txid: Option<String>,
    pub previous_vout: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub index: u32,
    /// Value in minor units
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

/// Read-only access to a chain daemon
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Height of the current chain tip
    async fn current_height(&self) -> Result<u64, ChainClientError>;

    /// Hash of the block at `height` on the active chain
    async fn block_hash_at(&self, height: u64) -> Result<String, ChainClientError>;

    /// Full block with ordered transactions
    async fn block_by_hash(&self, hash: &str) -> Result<ChainBlock, ChainClientError>;
}

/// Collect every P2PKH output in `block`, in transaction order and then
/// output index order. Outputs of any other script type are skipped.
pub fn extract_p2pkh_outputs(block: &ChainBlock, params: &NetworkParams) -> Vec<Transaction> {
    let mut matched = Vec::new();

    for tx in &block.transactions {
        for output in &tx.outputs {
            if let Some(address) = p2pkh_address(&output.script_pubkey, params) {
                matched.push(Transaction {
                    hash: tx.txid.clone(),
                    output_index: output.index,
                    value_minor_units: output.value,
                    to_address: address,
                });
            }
        }
    }

    matched
}

/// Decode the address a P2PKH script pays
///
/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_address(script: &ScriptBuf, params: &NetworkParams) -> Option<String> {
    if !script.is_p2pkh() {
        return None;
    }

    let mut pubkey_hash = [0u8; 20];
    pubkey_hash.copy_from_slice(&script.as_bytes()[3..23]);
    Some(encode_p2pkh(&pubkey_hash, params.pubkey_hash_version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::LITECOIN_MAINNET;

    fn p2pkh_script(hash: [u8; 20]) -> ScriptBuf {
        let mut bytes = vec![0x76, 0xa9, 0x14];
        bytes.extend_from_slice(&hash);
        bytes.extend_from_slice(&[0x88, 0xac]);
        ScriptBuf::from_bytes(bytes)
    }

    fn p2sh_script(hash: [u8; 20]) -> ScriptBuf {
        let mut bytes = vec![0xa9, 0x14];
        bytes.extend_from_slice(&hash);
        bytes.push(0x87);
        ScriptBuf::from_bytes(bytes)
    }

    #[test]
    fn test_extracts_only_p2pkh_in_order() {
        let block = ChainBlock {
            hash: "00".repeat(32),
            height: 10,
            transactions: vec![
                ChainTransaction {
                    txid: "aa".repeat(32),
                    inputs: vec![TxInput {
                        previous_txid: None,
                        previous_vout: None,
                    }],
                    outputs: vec![
                        TxOutput { index: 0, value: 5, script_pubkey: p2sh_script([1; 20]) },
                        TxOutput { index: 1, value: 6, script_pubkey: p2pkh_script([2; 20]) },
                    ],
                },
                ChainTransaction {
                    txid: "bb".repeat(32),
                    inputs: vec![],
                    outputs: vec![
                        TxOutput { index: 0, value: 7, script_pubkey: p2pkh_script([3; 20]) },
                        TxOutput { index: 1, value: 8, script_pubkey: p2pkh_script([2; 20]) },
                    ],
                },
            ],
        };

        let matched = extract_p2pkh_outputs(&block, &LITECOIN_MAINNET);

        let keys: Vec<(String, u32, u64)> = matched
            .iter()
            .map(|t| (t.hash.clone(), t.output_index, t.value_minor_units))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("aa".repeat(32), 1, 6),
                ("bb".repeat(32), 0, 7),
                ("bb".repeat(32), 1, 8),
            ]
        );
        assert_eq!(matched[0].to_address, matched[2].to_address);
        assert!(matched.iter().all(|t| t.to_address.starts_with('L')));
    }

    #[test]
    fn test_address_matches_encoding() {
        let script = p2pkh_script([0xab; 20]);
        assert_eq!(
            p2pkh_address(&script, &LITECOIN_MAINNET),
            Some(encode_p2pkh(&[0xab; 20], LITECOIN_MAINNET.pubkey_hash_version))
        );
        assert_eq!(p2pkh_address(&p2sh_script([0xab; 20]), &LITECOIN_MAINNET), None);
    }
}
