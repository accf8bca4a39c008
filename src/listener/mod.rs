//! Chain Listener Module
//!
//! Block scanning against a chain daemon:
//! - `client` - `ChainClient` trait and block data model
//! - `rpc` - JSON-RPC client for bitcoind-compatible daemons
//! - `listener` - resumable `ChainListener` with whole-block retry

pub mod client;
#[allow(clippy::module_inception)]
pub mod listener;
pub mod rpc;

pub use client::{
    extract_p2pkh_outputs, p2pkh_address, ChainBlock, ChainClient, ChainClientError,
    ChainTransaction, TxInput, TxOutput,
};
pub use listener::{
    ChainListener, CycleOutcome, HandlerError, ListenerConfig, ListenerError, ListenerState,
    ListenerStats, TransactionHandler,
};
pub use rpc::RpcChainClient;
