//! Structured Logging
//!
//! `tracing` subscriber setup plus JSON event records for the deposit
//! lifecycle. Mainnet logs as JSON for aggregation; other networks log in
//! a human-readable format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use utxo_bridge::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?;
//! tracing::info!(target: "bridge::listener", height, "Block committed");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::{BridgeConfig, Network};
use crate::types::Chain;

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Deposit handling outcomes
    Deposit,
    /// Block commit / retry
    Block,
    /// Startup and shutdown
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (RFC 3339)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    /// Source transaction hash for deposit events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for failed events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Log a deposit outcome (queued, halted, enqueue failure)
pub fn log_deposit_event(
    event_type: &str,
    tx_hash: &str,
    address: &str,
    value_minor_units: u64,
    success: bool,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Deposit, event_type)
        .with_correlation_id(tx_hash)
        .with_data(serde_json::json!({
            "address": address,
            "value_minor_units": value_minor_units,
            "success": success
        }));

    if let Some(err) = error {
        event = event.with_error("DEPOSIT_ERROR", err);
    }

    if success {
        tracing::info!(target: "bridge::deposit", "{}", event.to_json());
    } else {
        tracing::error!(target: "bridge::deposit", "{}", event.to_json());
    }
}

/// Log a block commit or retry
pub fn log_block_event(event_type: &str, chain: Chain, height: u64, outputs: usize, committed: bool) {
    let level = if committed { LogLevel::Info } else { LogLevel::Warn };
    let event = LogEvent::new(level, EventCategory::Block, event_type).with_data(serde_json::json!({
        "chain": chain,
        "height": height,
        "outputs": outputs,
    }));

    if committed {
        tracing::info!(target: "bridge::listener", "{}", event.to_json());
    } else {
        tracing::warn!(target: "bridge::listener", "{}", event.to_json());
    }
}

/// Log a startup / shutdown event
pub fn log_system_event(event_type: &str, details: serde_json::Value) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::System, event_type).with_data(details);
    tracing::info!(target: "bridge::system", "{}", event.to_json());
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_filter();
        EnvFilter::new(format!(
            "utxo_bridge={level},bridge={level},tower_http={level},axum={level}"
        ))
    });

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_target(true).with_line_number(true))
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from BridgeConfig
pub fn init_from_config(config: &BridgeConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    let json_format = config.network == Network::Mainnet;

    init_logging(level, json_format)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Error, EventCategory::Deposit, "deposit_halted")
            .with_correlation_id("109fa1c3")
            .with_data(serde_json::json!({"value_minor_units": 100000001u64}))
            .with_error("DEPOSIT_ERROR", "precision loss");

        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["level"], "ERROR");
        assert_eq!(json["category"], "deposit");
        assert_eq!(json["correlation_id"], "109fa1c3");
        assert_eq!(json["error"]["code"], "DEPOSIT_ERROR");
    }

    #[test]
    fn test_optional_fields_skipped() {
        let json = LogEvent::new(LogLevel::Info, EventCategory::System, "listener_started").to_json();
        assert!(!json.contains("correlation_id"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }
}
