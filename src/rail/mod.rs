//! Deposit Rail Module
//!
//! Turns matched chain payments into outbound payment requests, and
//! provisions the deposit addresses those payments are sent to.

pub mod provision;
pub mod service;

pub use provision::{provision_address, ProvisionError};
pub use service::{DepositRail, NotifyFailurePolicy, RailConfig, RailError, RailOutcome};
