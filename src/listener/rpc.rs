//! JSON-RPC Chain Client
//!
//! Talks to a bitcoind-compatible daemon (litecoind, bitcoind) over its
//! JSON-RPC interface using `getblockcount`, `getblockhash` and
//! `getblock <hash> 2`. Output amounts arrive as decimal coin values and are
//! converted to minor units exactly.

use async_trait::async_trait;
use bitcoin::ScriptBuf;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::client::{ChainBlock, ChainClient, ChainClientError, ChainTransaction, TxInput, TxOutput};
use crate::types::{ValueConverter, COIN_DECIMALS};

/// RPC error codes for missing blocks
const RPC_INVALID_PARAMETER: i64 = -8;
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// JSON-RPC client for a chain daemon
pub struct RpcChainClient {
    client: Client,
    url: String,
    auth: Option<(String, String)>,
    converter: ValueConverter,
    next_id: AtomicU64,
}

impl RpcChainClient {
    /// Create a new client with the daemon URL
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            auth: None,
            converter: ValueConverter::new(COIN_DECIMALS, COIN_DECIMALS),
            next_id: AtomicU64::new(1),
        }
    }

    /// Use HTTP basic auth (rpcuser / rpcpassword)
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }

    /// Decimal places of the chain's coin amounts (default 8)
    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.converter = ValueConverter::new(decimals, decimals);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainClientError> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some((user, password)) = &self.auth {
            builder = builder.basic_auth(user, Some(password));
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        // bitcoind reports RPC errors with HTTP 500 and a JSON body
        let parsed: RpcResponse<T> = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                ChainClientError::ParseError(format!("{}: {}", method, e))
            } else {
                ChainClientError::ParseError(format!("{} returned HTTP {}", method, status))
            }
        })?;

        if let Some(error) = parsed.error {
            return Err(ChainClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        parsed
            .result
            .ok_or_else(|| ChainClientError::ParseError(format!("{}: missing result", method)))
    }

    fn parse_block(&self, raw: RpcBlock) -> Result<ChainBlock, ChainClientError> {
        let transactions = raw
            .tx
            .into_iter()
            .map(|tx| self.parse_transaction(tx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChainBlock {
            hash: raw.hash,
            height: raw.height,
            transactions,
        })
    }

    fn parse_transaction(&self, raw: RpcTransaction) -> Result<ChainTransaction, ChainClientError> {
        let inputs = raw
            .vin
            .into_iter()
            .map(|input| TxInput {
                previous_txid: input.txid,
                previous_vout: input.vout,
            })
            .collect();

        let mut outputs = Vec::with_capacity(raw.vout.len());
        for output in raw.vout {
            let amount = output.value.to_string();
            let value = self.converter.to_minor_units(&amount).map_err(|e| {
                ChainClientError::ParseError(format!("{}:{} value: {}", raw.txid, output.n, e))
            })?;
            let script = hex::decode(&output.script_pub_key.hex).map_err(|e| {
                ChainClientError::ParseError(format!("{}:{} script: {}", raw.txid, output.n, e))
            })?;

            outputs.push(TxOutput {
                index: output.n,
                value,
                script_pubkey: ScriptBuf::from_bytes(script),
            });
        }

        Ok(ChainTransaction {
            txid: raw.txid,
            inputs,
            outputs,
        })
    }
}

fn not_found_or(err: ChainClientError, what: String) -> ChainClientError {
    match err {
        ChainClientError::Rpc { code, .. }
            if code == RPC_INVALID_PARAMETER || code == RPC_INVALID_ADDRESS_OR_KEY =>
        {
            ChainClientError::BlockNotFound(what)
        }
        other => other,
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_height(&self) -> Result<u64, ChainClientError> {
        self.call("getblockcount", serde_json::json!([])).await
    }

    async fn block_hash_at(&self, height: u64) -> Result<String, ChainClientError> {
        self.call("getblockhash", serde_json::json!([height]))
            .await
            .map_err(|e| not_found_or(e, format!("height {}", height)))
    }

    async fn block_by_hash(&self, hash: &str) -> Result<ChainBlock, ChainClientError> {
        let raw: RpcBlock = self
            .call("getblock", serde_json::json!([hash, 2]))
            .await
            .map_err(|e| not_found_or(e, hash.to_string()))?;

        self.parse_block(raw)
    }
}

// =============================================================================
// JSON-RPC Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    hash: String,
    height: u64,
    tx: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    txid: String,
    #[serde(default)]
    vin: Vec<RpcInput>,
    #[serde(default)]
    vout: Vec<RpcOutput>,
}

#[derive(Debug, Deserialize)]
struct RpcInput {
    txid: Option<String>,
    vout: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RpcOutput {
    value: serde_json::Number,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: RpcScript,
}

#[derive(Debug, Deserialize)]
struct RpcScript {
    hex: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_JSON: &str = r#"{
        "hash": "6bbd3e6fe8e4a1c7a3d5e8ac3d4a0f1d5e9c1cd0a9f9a1f1e4d3c2b1a0f9e8d7",
        "height": 2500000,
        "tx": [
            {
                "txid": "109fa1c369680c2f27643fdd160620d010851a376d25b9b00ef71afe789ea6ed",
                "vin": [{"coinbase": "03a0252601", "sequence": 4294967295}],
                "vout": [
                    {
                        "value": 12.50000001,
                        "n": 0,
                        "scriptPubKey": {"hex": "76a914abababababababababababababababababababab88ac", "type": "pubkeyhash"}
                    }
                ]
            },
            {
                "txid": "209fa1c369680c2f27643fdd160620d010851a376d25b9b00ef71afe789ea6ed",
                "vin": [{"txid": "109fa1c369680c2f27643fdd160620d010851a376d25b9b00ef71afe789ea6ed", "vout": 0}],
                "vout": [
                    {"value": 0.10000000, "n": 0, "scriptPubKey": {"hex": "a914abababababababababababababababababababab87"}},
                    {"value": 1e-8, "n": 1, "scriptPubKey": {"hex": "76a914cdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd88ac"}}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_block_values_are_exact() {
        let client = RpcChainClient::new("http://127.0.0.1:9332/");
        let raw: RpcBlock = serde_json::from_str(BLOCK_JSON).unwrap();
        let block = client.parse_block(raw).unwrap();

        assert_eq!(block.height, 2_500_000);
        assert_eq!(block.transactions.len(), 2);

        let coinbase = &block.transactions[0];
        assert_eq!(coinbase.inputs[0].previous_txid, None);
        assert_eq!(coinbase.outputs[0].value, 1_250_000_001);
        assert!(coinbase.outputs[0].script_pubkey.is_p2pkh());

        let spend = &block.transactions[1];
        assert_eq!(spend.inputs[0].previous_vout, Some(0));
        assert_eq!(spend.outputs[0].value, 10_000_000);
        assert_eq!(spend.outputs[1].value, 1);
        assert_eq!(spend.outputs[1].index, 1);
    }

    #[test]
    fn test_rpc_error_response() {
        let body = r#"{"result": null, "error": {"code": -8, "message": "Block height out of range"}, "id": 1}"#;
        let parsed: RpcResponse<String> = serde_json::from_str(body).unwrap();
        let error = parsed.error.unwrap();

        let mapped = not_found_or(
            ChainClientError::Rpc {
                code: error.code,
                message: error.message,
            },
            "height 99".to_string(),
        );
        assert!(matches!(mapped, ChainClientError::BlockNotFound(_)));
    }

    #[test]
    fn test_url_trailing_slash_trimmed() {
        let client = RpcChainClient::new("http://127.0.0.1:9332/").with_auth("user", "pass");
        assert_eq!(client.url(), "http://127.0.0.1:9332");
    }
}
