//! Deposit Address Derivation
//!
//! Deterministic P2PKH deposit addresses derived from a single extended
//! public key. Only public derivation is used; the bridge never holds a
//! private key.

pub mod generator;
pub mod network;

pub use generator::{encode_p2pkh, AddressError, AddressGenerator, EXTERNAL_CHAIN};
pub use network::{
    NetworkParams, BITCOIN_MAINNET, BITCOIN_TESTNET, LITECOIN_MAINNET, LITECOIN_TESTNET,
};
