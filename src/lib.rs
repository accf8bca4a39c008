//! UTXO Deposit Bridge
//!
//! Watches a UTXO chain (Litecoin, Bitcoin) for payments to per-user
//! deposit addresses and turns each one into a payment request for a
//! destination ledger.
//!
//! ## Components
//!
//! 1. **Address Generator** - Derives P2PKH deposit addresses from an
//!    extended public key
//! 2. **Chain Listener** - Scans blocks in order, resumable from a stored cursor
//! 3. **Deposit Rail** - Filters, dedups, converts and enqueues deposits
//! 4. **Notifications** - Server-Sent Events per deposit address
//!
//! Amounts are exact decimals end to end; no floating point is involved.

pub mod address;
pub mod common;
pub mod events;
pub mod listener;
pub mod queue;
pub mod rail;
pub mod storage;
pub mod types;

// Re-exports: Address derivation
pub use address::{AddressError, AddressGenerator, NetworkParams};

// Re-exports: Listener
pub use listener::{
    ChainClient, ChainClientError, ChainListener, ListenerConfig, ListenerError, RpcChainClient,
    TransactionHandler,
};

// Re-exports: Rail
pub use rail::{provision_address, DepositRail, NotifyFailurePolicy, RailConfig, RailError};

// Re-exports: Collaborators
pub use events::{ChannelBroadcaster, EventBroadcaster, EventType};
pub use queue::{MemoryPaymentQueue, PaymentQueue, QueueError};
pub use storage::{AssociationStore, MemoryStore, SqliteStore, Storage, StorageError};

// Re-exports: Shared types
pub use common::{BridgeConfig, BridgeError};
pub use types::{
    AddressAssociation, AssetCode, Chain, ConversionError, PaymentRequest, Transaction,
    ValueConverter,
};
