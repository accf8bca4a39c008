//! Common Infrastructure Module
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - The root error type

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{BridgeConfig, ConfigError, Network};
pub use error::{BridgeError, Result};
pub use logging::{
    init_from_config, init_logging, log_block_event, log_deposit_event, log_system_event,
    ErrorDetails, EventCategory, LogEvent, LogLevel, LoggingError,
};
