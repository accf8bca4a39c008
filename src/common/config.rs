//! Environment-based Configuration
//!
//! All settings come from `BRIDGE_*` environment variables (a `.env` file is
//! loaded first by the binary).
//!
//! # Environment Variables
//!
//! ## Chain
//! - `BRIDGE_NETWORK` - "mainnet" or "testnet" (default: "testnet")
//! - `BRIDGE_CHAIN` - "litecoin" or "bitcoin" (default: "litecoin")
//! - `BRIDGE_RPC_URL` - Chain daemon JSON-RPC endpoint
//! - `BRIDGE_RPC_USER` / `BRIDGE_RPC_PASSWORD` - Daemon RPC credentials
//! - `BRIDGE_MASTER_PUBLIC_KEY` - Extended public key for deposit addresses
//!
//! ## Amounts
//! - `BRIDGE_MINIMUM_VALUE` - Smallest accepted deposit in minor units
//! - `BRIDGE_SOURCE_DECIMALS` / `BRIDGE_TARGET_DECIMALS` - Amount precision
//! - `BRIDGE_ASSET_CODE` - Asset code on the destination ledger
//!
//! ## Runtime
//! - `BRIDGE_DATABASE_PATH` - SQLite database file
//! - `BRIDGE_POLL_INTERVAL_SECS` - Delay between polls when no block is ready
//! - `BRIDGE_NOTIFY_FAILURE` - "best-effort" or "fail-handler"
//! - `BRIDGE_SSE_PORT` - Port of the notification server
//! - `BRIDGE_LOG_LEVEL` - Logging level (debug, info, warn, error)

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::address::NetworkParams;
use crate::rail::{NotifyFailurePolicy, RailConfig};
use crate::types::{AssetCode, Chain, ValueConverter, COIN_DECIMALS, MINOR_UNITS_PER_COIN, TARGET_DECIMALS};

/// Largest supported decimal precision
const MAX_DECIMALS: u32 = 18;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            _ => Err(ConfigError::InvalidValue(
                "BRIDGE_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    /// Default daemon RPC endpoint for `chain` on this network
    pub fn default_rpc_url(&self, chain: Chain) -> &'static str {
        match (chain, self) {
            (Chain::Litecoin, Network::Mainnet) => "http://127.0.0.1:9332",
            (Chain::Litecoin, Network::Testnet) => "http://127.0.0.1:19332",
            (Chain::Bitcoin, Network::Mainnet) => "http://127.0.0.1:8332",
            (Chain::Bitcoin, Network::Testnet) => "http://127.0.0.1:18332",
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub network: Network,
    pub chain: Chain,

    /// Chain daemon JSON-RPC endpoint
    pub rpc_url: String,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,

    /// Extended public key deposit addresses derive from
    pub master_public_key: Option<String>,

    pub database_path: String,

    /// Minimum deposit in minor units
    pub minimum_value: u64,
    pub source_decimals: u32,
    pub target_decimals: u32,
    pub asset_code: AssetCode,

    pub poll_interval: Duration,
    pub notify_failure: NotifyFailurePolicy,
    pub sse_port: u16,
    pub log_level: String,
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let network: Network = env::var("BRIDGE_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .parse()?;

        let chain: Chain = parse_or("BRIDGE_CHAIN", Chain::Litecoin)?;

        let rpc_url = env::var("BRIDGE_RPC_URL")
            .unwrap_or_else(|_| network.default_rpc_url(chain).to_string());
        let rpc_user = env::var("BRIDGE_RPC_USER").ok();
        let rpc_password = env::var("BRIDGE_RPC_PASSWORD").ok();
        if rpc_user.is_some() != rpc_password.is_some() {
            return Err(ConfigError::InvalidValue(
                "BRIDGE_RPC_USER".to_string(),
                "user and password must be set together".to_string(),
            ));
        }

        let master_public_key = env::var("BRIDGE_MASTER_PUBLIC_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let database_path =
            env::var("BRIDGE_DATABASE_PATH").unwrap_or_else(|_| "data/bridge.db".to_string());

        let minimum_value = parse_or("BRIDGE_MINIMUM_VALUE", MINOR_UNITS_PER_COIN)?;
        let source_decimals = parse_decimals("BRIDGE_SOURCE_DECIMALS", COIN_DECIMALS)?;
        let target_decimals = parse_decimals("BRIDGE_TARGET_DECIMALS", TARGET_DECIMALS)?;

        let asset_code = env::var("BRIDGE_ASSET_CODE")
            .ok()
            .filter(|code| !code.trim().is_empty())
            .map(|code| AssetCode::new(code.trim()))
            .unwrap_or_else(|| AssetCode::for_chain(chain));

        let poll_secs: u64 = parse_or("BRIDGE_POLL_INTERVAL_SECS", 1)?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "BRIDGE_POLL_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let notify_failure = match env::var("BRIDGE_NOTIFY_FAILURE") {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidValue("BRIDGE_NOTIFY_FAILURE".to_string(), e))?,
            Err(_) => NotifyFailurePolicy::BestEffort,
        };

        let sse_port = parse_or("BRIDGE_SSE_PORT", 8000u16)?;
        let log_level = env::var("BRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            network,
            chain,
            rpc_url,
            rpc_user,
            rpc_password,
            master_public_key,
            database_path,
            minimum_value,
            source_decimals,
            target_decimals,
            asset_code,
            poll_interval: Duration::from_secs(poll_secs),
            notify_failure,
            sse_port,
            log_level,
        })
    }

    /// Address and script parameters for the configured chain
    pub fn network_params(&self) -> NetworkParams {
        NetworkParams::for_chain(self.chain, self.network.is_testnet())
    }

    pub fn value_converter(&self) -> ValueConverter {
        ValueConverter::new(self.source_decimals, self.target_decimals)
    }

    pub fn rail_config(&self) -> RailConfig {
        RailConfig {
            chain: self.chain,
            minimum_value: self.minimum_value,
            asset_code: self.asset_code.clone(),
            converter: self.value_converter(),
            notify_failure: self.notify_failure,
        }
    }

    /// Master public key, required for address derivation
    pub fn require_master_public_key(&self) -> Result<&str, ConfigError> {
        self.master_public_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("BRIDGE_MASTER_PUBLIC_KEY".to_string()))
    }

    /// Whether some deposits cannot be represented at the destination precision
    pub fn allows_precision_loss(&self) -> bool {
        self.target_decimals < self.source_decimals
    }

    /// Log configuration summary (hiding credentials)
    pub fn log_summary(&self) {
        tracing::info!(
            target: "bridge::config",
            network = ?self.network,
            chain = %self.chain,
            rpc_url = %self.rpc_url,
            rpc_auth = self.rpc_user.is_some(),
            database = %self.database_path,
            minimum_value = self.minimum_value,
            source_decimals = self.source_decimals,
            target_decimals = self.target_decimals,
            asset_code = %self.asset_code,
            notify_failure = ?self.notify_failure,
            sse_port = self.sse_port,
            "Configuration loaded"
        );

        if self.allows_precision_loss() {
            tracing::warn!(
                target: "bridge::config",
                source_decimals = self.source_decimals,
                target_decimals = self.target_decimals,
                "Target precision is lower than source precision; deposits with unrepresentable amounts will be halted"
            );
        }
    }
}

fn parse_or<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(var_name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_decimals(var_name: &str, default: u32) -> Result<u32, ConfigError> {
    let decimals = parse_or(var_name, default)?;
    if decimals > MAX_DECIMALS {
        return Err(ConfigError::InvalidValue(
            var_name.to_string(),
            format!("at most {} decimal places supported", MAX_DECIMALS),
        ));
    }
    Ok(decimals)
}
