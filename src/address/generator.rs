//! HD Deposit Address Generator
//!
//! Derives `index`-th non-hardened children of an extended public key and
//! encodes them as base58check P2PKH addresses:
//!
//! ```text
//! address = base58check(version || RIPEMD160(SHA256(child_pubkey)))
//! ```
//!
//! The same (key, index) always yields the same address, on any machine.

use bitcoin::base58;
use bitcoin::bip32::{self, ChildNumber, Xpub};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{PublicKey, Secp256k1, VerifyOnly};
use thiserror::Error;

use super::network::NetworkParams;

/// Sub-path of the "external" (receive) chain below an account key
pub const EXTERNAL_CHAIN: u32 = 0;

/// Serialized extended key length (BIP32)
const EXTENDED_KEY_LEN: usize = 78;

/// Version the bip32 decoder understands; foreign prefixes are mapped onto it
/// once they have been checked against the network params.
const CANONICAL_XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];

/// Address generation errors
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("malformed extended public key: {0}")]
    MalformedKey(String),

    #[error("extended key version {version} not accepted on {network}")]
    UnsupportedVersion {
        version: String,
        network: &'static str,
    },

    #[error("index {0} is hardened, public derivation needs index < 2^31")]
    HardenedIndex(u32),

    #[error("key derivation failed: {0}")]
    Derivation(#[from] bip32::Error),
}

/// Generates deposit addresses from an extended public key
pub struct AddressGenerator {
    /// Key whose direct children are deposit keys
    chain_key: Xpub,
    params: NetworkParams,
    secp: Secp256k1<VerifyOnly>,
}

impl AddressGenerator {
    /// Build from a key that already sits at the external-chain level
    /// (e.g. exported at `m/44'/2'/0'/0`); `generate(i)` derives child `i`.
    pub fn new(master_public_key: &str, params: NetworkParams) -> Result<Self, AddressError> {
        let chain_key = decode_extended_key(master_public_key, &params)?;

        Ok(Self {
            chain_key,
            params,
            secp: Secp256k1::verification_only(),
        })
    }

    /// Build from an account-level key; derives the external chain child
    /// first, so `generate(i)` yields `<account>/0/i`.
    pub fn from_account_key(
        account_public_key: &str,
        params: NetworkParams,
    ) -> Result<Self, AddressError> {
        let account_key = decode_extended_key(account_public_key, &params)?;
        let secp = Secp256k1::verification_only();
        let chain_key =
            account_key.ckd_pub(&secp, ChildNumber::from_normal_idx(EXTERNAL_CHAIN)?)?;

        Ok(Self {
            chain_key,
            params,
            secp,
        })
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Derive the deposit address for `index`
    pub fn generate(&self, index: u32) -> Result<String, AddressError> {
        let child =
            ChildNumber::from_normal_idx(index).map_err(|_| AddressError::HardenedIndex(index))?;
        let child_key = self.chain_key.ckd_pub(&self.secp, child)?;

        Ok(p2pkh_address(&child_key.public_key, self.params.pubkey_hash_version))
    }
}

fn decode_extended_key(encoded: &str, params: &NetworkParams) -> Result<Xpub, AddressError> {
    let mut data = base58::decode_check(encoded.trim())
        .map_err(|e| AddressError::MalformedKey(e.to_string()))?;

    if data.len() != EXTENDED_KEY_LEN {
        return Err(AddressError::MalformedKey(format!(
            "expected {} bytes, got {}",
            EXTENDED_KEY_LEN,
            data.len()
        )));
    }

    if !params.accepts_xpub_version(&data[..4]) {
        return Err(AddressError::UnsupportedVersion {
            version: hex::encode(&data[..4]),
            network: params.name,
        });
    }

    data[..4].copy_from_slice(&CANONICAL_XPUB_VERSION);
    Ok(Xpub::decode(&data)?)
}

fn p2pkh_address(public_key: &PublicKey, version: u8) -> String {
    let pubkey_hash = hash160::Hash::hash(&public_key.serialize());
    encode_p2pkh(pubkey_hash.as_byte_array(), version)
}

/// Base58check-encode a 20-byte public-key hash with a network version byte
pub fn encode_p2pkh(pubkey_hash: &[u8; 20], version: u8) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(pubkey_hash);
    base58::encode_check(&payload)
}
