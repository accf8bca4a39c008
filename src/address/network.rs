//! Network parameters for P2PKH address encoding

use crate::types::Chain;

/// Address and extended-key version bytes for one chain/network pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: &'static str,
    pub chain: Chain,
    pub testnet: bool,
    /// Version byte prepended to the public-key hash
    pub pubkey_hash_version: u8,
    /// Accepted serialized extended public key version prefixes
    pub xpub_versions: &'static [[u8; 4]],
}

/// `xpub`
const XPUB: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
/// `tpub`
const TPUB: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];
/// `Ltub`
const LTUB: [u8; 4] = [0x01, 0x9D, 0xA4, 0x62];
/// `ttub`
const TTUB: [u8; 4] = [0x04, 0x36, 0xF6, 0xE1];

pub const LITECOIN_MAINNET: NetworkParams = NetworkParams {
    name: "litecoin-mainnet",
    chain: Chain::Litecoin,
    testnet: false,
    pubkey_hash_version: 0x30,
    xpub_versions: &[LTUB, XPUB],
};

pub const LITECOIN_TESTNET: NetworkParams = NetworkParams {
    name: "litecoin-testnet",
    chain: Chain::Litecoin,
    testnet: true,
    pubkey_hash_version: 0x6F,
    xpub_versions: &[TTUB, TPUB],
};

pub const BITCOIN_MAINNET: NetworkParams = NetworkParams {
    name: "bitcoin-mainnet",
    chain: Chain::Bitcoin,
    testnet: false,
    pubkey_hash_version: 0x00,
    xpub_versions: &[XPUB],
};

pub const BITCOIN_TESTNET: NetworkParams = NetworkParams {
    name: "bitcoin-testnet",
    chain: Chain::Bitcoin,
    testnet: true,
    pubkey_hash_version: 0x6F,
    xpub_versions: &[TPUB],
};

impl NetworkParams {
    pub fn for_chain(chain: Chain, testnet: bool) -> Self {
        match (chain, testnet) {
            (Chain::Litecoin, false) => LITECOIN_MAINNET,
            (Chain::Litecoin, true) => LITECOIN_TESTNET,
            (Chain::Bitcoin, false) => BITCOIN_MAINNET,
            (Chain::Bitcoin, true) => BITCOIN_TESTNET,
        }
    }

    pub fn accepts_xpub_version(&self, version: &[u8]) -> bool {
        self.xpub_versions.iter().any(|v| v.as_slice() == version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_chain() {
        assert_eq!(NetworkParams::for_chain(Chain::Litecoin, false), LITECOIN_MAINNET);
        assert_eq!(NetworkParams::for_chain(Chain::Bitcoin, true), BITCOIN_TESTNET);
        assert!(LITECOIN_MAINNET.accepts_xpub_version(&LTUB));
        assert!(!BITCOIN_MAINNET.accepts_xpub_version(&LTUB));
    }
}
