//! UTXO Bridge
//!
//! Run modes:
//!   utxo-bridge run                      - Start listener and SSE server
//!   utxo-bridge address <index>          - Print the deposit address for an index
//!   utxo-bridge provision <account-key>  - Allocate a deposit address for an account
//!
//! All settings come from `BRIDGE_*` environment variables (`.env` is loaded).

use std::env;
use std::sync::Arc;
use tokio::sync::watch;

use utxo_bridge::common::{init_from_config, log_system_event, BridgeConfig, BridgeError};
use utxo_bridge::events::{start_events_server, ChannelBroadcaster};
use utxo_bridge::listener::{ChainListener, ListenerConfig, RpcChainClient};
use utxo_bridge::rail::{provision_address, DepositRail};
use utxo_bridge::storage::SqliteStore;
use utxo_bridge::AddressGenerator;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    let result = match args[1].as_str() {
        "run" => run_bridge().await,
        "address" => print_address(&args[2..]),
        "provision" => provision(&args[2..]).await,
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("UTXO Bridge - deposit listener");
    println!();
    println!("Usage:");
    println!("  utxo-bridge run                      Start listener and SSE server");
    println!("  utxo-bridge address <index>          Print the deposit address for an index");
    println!("  utxo-bridge provision <account-key>  Allocate a deposit address for an account");
    println!();
    println!("Environment Variables:");
    println!("  BRIDGE_NETWORK            mainnet | testnet (default: testnet)");
    println!("  BRIDGE_CHAIN              litecoin | bitcoin (default: litecoin)");
    println!("  BRIDGE_RPC_URL            Chain daemon JSON-RPC endpoint");
    println!("  BRIDGE_RPC_USER           Daemon RPC user");
    println!("  BRIDGE_RPC_PASSWORD       Daemon RPC password");
    println!("  BRIDGE_MASTER_PUBLIC_KEY  Extended public key for deposit addresses");
    println!("  BRIDGE_DATABASE_PATH      SQLite database (default: data/bridge.db)");
    println!("  BRIDGE_MINIMUM_VALUE      Minimum deposit in minor units (default: 100000000)");
    println!("  BRIDGE_NOTIFY_FAILURE     best-effort | fail-handler (default: best-effort)");
    println!("  BRIDGE_SSE_PORT           Notification server port (default: 8000)");
    println!("  BRIDGE_LOG_LEVEL          Logging level (default: info)");
}

fn load_config() -> Result<BridgeConfig, BridgeError> {
    let config = BridgeConfig::from_env()?;
    init_from_config(&config)?;
    config.log_summary();
    Ok(config)
}

fn open_store(config: &BridgeConfig) -> Result<SqliteStore, BridgeError> {
    Ok(SqliteStore::new(&config.database_path)?)
}

fn address_generator(config: &BridgeConfig) -> Result<AddressGenerator, BridgeError> {
    let key = config.require_master_public_key()?;
    Ok(AddressGenerator::new(key, config.network_params())?)
}

fn print_address(args: &[String]) -> Result<(), BridgeError> {
    let config = BridgeConfig::from_env()?;
    let generator = address_generator(&config)?;

    let Some(index) = args.first().and_then(|arg| arg.parse::<u32>().ok()) else {
        print_usage();
        return Ok(());
    };

    println!("{}", generator.generate(index)?);
    Ok(())
}

async fn provision(args: &[String]) -> Result<(), BridgeError> {
    let Some(account) = args.first() else {
        print_usage();
        return Ok(());
    };

    let config = load_config()?;
    let generator = address_generator(&config)?;
    let store = open_store(&config)?;

    let association = provision_address(&store, &generator, config.chain, account).await?;
    println!(
        "{} (index {}) -> {}",
        association.address, association.address_index, association.destination_account_key
    );
    Ok(())
}

async fn run_bridge() -> Result<(), BridgeError> {
    let config = load_config()?;

    let store = Arc::new(open_store(&config)?);
    let broadcaster = Arc::new(ChannelBroadcaster::default());

    let mut client = RpcChainClient::new(&config.rpc_url).with_decimals(config.source_decimals);
    if let (Some(user), Some(password)) = (&config.rpc_user, &config.rpc_password) {
        client = client.with_auth(user.as_str(), password.as_str());
    }

    // Payments go to the durable queue table on the same database
    let rail = DepositRail::new(
        config.rail_config(),
        store.clone(),
        store.clone(),
        broadcaster.clone(),
    );

    let mut listener = ChainListener::new(
        Arc::new(client),
        store.clone(),
        Arc::new(rail),
        ListenerConfig::new(config.network_params()).with_poll_interval(config.poll_interval),
    );

    let sse_port = config.sse_port;
    let sse_broadcaster = broadcaster.clone();
    tokio::spawn(async move {
        if let Err(e) = start_events_server(sse_broadcaster, sse_port).await {
            tracing::error!(target: "bridge::events", error = %e, "SSE server stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "bridge::system", "Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    log_system_event(
        "bridge_started",
        serde_json::json!({
            "chain": config.chain,
            "rpc_url": config.rpc_url,
            "sse_port": sse_port,
        }),
    );

    listener.run(shutdown_rx).await;

    log_system_event(
        "bridge_stopped",
        serde_json::json!({ "stats": format!("{:?}", listener.stats()) }),
    );
    Ok(())
}
