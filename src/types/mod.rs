//! Shared Types Module
//!
//! Data types shared across the bridge.

pub mod association;
pub mod payment;
pub mod transaction;
pub mod units;

// Re-exports for convenience
pub use association::AddressAssociation;
pub use payment::{AssetCode, PaymentRequest};
pub use transaction::{Chain, Transaction};
pub use units::{
    convert_precision, decimal_to_minor_units, minor_units_to_decimal, ConversionError,
    ValueConverter, COIN_DECIMALS, MINOR_UNITS_PER_COIN, TARGET_DECIMALS,
};
