//! Root error type for the bridge binary and library callers.

use thiserror::Error;

use crate::address::AddressError;
use crate::events::BroadcastError;
use crate::listener::{ChainClientError, ListenerError};
use crate::queue::QueueError;
use crate::rail::{ProvisionError, RailError};
use crate::storage::StorageError;
use crate::types::ConversionError;

/// Root error type
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("chain client error: {0}")]
    ChainClient(#[from] ChainClientError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("notification error: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("rail error: {0}")]
    Rail(#[from] RailError),

    #[error("provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Transient collaborator failures; the listener recovers from these by
    /// replaying the block on the next cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::ChainClient(_)
            | BridgeError::Queue(_)
            | BridgeError::Broadcast(_)
            | BridgeError::Listener(_)
            | BridgeError::Io(_) => true,
            BridgeError::Storage(e) => !matches!(e, StorageError::InvalidData(_)),
            BridgeError::Rail(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Stable error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Logging(_) => "LOGGING_ERROR",
            BridgeError::Address(_) => "ADDRESS_ERROR",
            BridgeError::Conversion(ConversionError::PrecisionLoss { .. }) => "PRECISION_LOSS",
            BridgeError::Conversion(_) => "CONVERSION_ERROR",
            BridgeError::ChainClient(_) => "CHAIN_CLIENT_ERROR",
            BridgeError::Storage(_) => "STORAGE_ERROR",
            BridgeError::Queue(_) => "QUEUE_ERROR",
            BridgeError::Broadcast(_) => "BROADCAST_ERROR",
            BridgeError::Rail(_) => "RAIL_ERROR",
            BridgeError::Provision(_) => "PROVISION_ERROR",
            BridgeError::Listener(_) => "LISTENER_ERROR",
            BridgeError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ConfigError;

    #[test]
    fn test_error_codes() {
        let err: BridgeError = ConfigError::MissingEnvVar("BRIDGE_MASTER_PUBLIC_KEY".into()).into();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("BRIDGE_MASTER_PUBLIC_KEY"));

        let err: BridgeError = ConversionError::PrecisionLoss {
            amount: "1.00000001".into(),
            decimal_places: 7,
        }
        .into();
        assert_eq!(err.error_code(), "PRECISION_LOSS");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(BridgeError::from(QueueError::Unavailable("down".into())).is_retryable());
        assert!(BridgeError::from(StorageError::Connection("pool".into())).is_retryable());
        assert!(!BridgeError::from(StorageError::InvalidData("bad row".into())).is_retryable());
        assert!(!BridgeError::from(AddressError::HardenedIndex(1 << 31)).is_retryable());
    }
}
