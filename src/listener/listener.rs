//! Chain Listener
//!
//! Scans blocks in strictly increasing height order and hands every P2PKH
//! output to a [`TransactionHandler`]:
//!
//! ```text
//! Idle → Polling → FetchingBlock(h) → ProcessingBlock(h) → FetchingBlock(h+1) ...
//!           ↑            │
//!           └─ Waiting ←─┘ (h above the chain tip)
//! ```
//!
//! A block is committed (cursor persisted as `h`) only after the handler
//! returned `Ok` for every output in it. Any failure leaves the cursor where
//! it was and the whole block is replayed on the next cycle, so handlers must
//! be idempotent. Shutdown is only observed between cycles, never mid-block.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use super::client::{extract_p2pkh_outputs, ChainClient, ChainClientError};
use crate::address::NetworkParams;
use crate::common::logging::{log_block_event, log_system_event};
use crate::storage::{Storage, StorageError};
use crate::types::{Chain, Transaction};

/// Error type handlers report back to the listener
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every P2PKH output the listener sees
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    async fn handle(&self, transaction: &Transaction) -> Result<(), HandlerError>;
}

/// Listener errors
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("chain client error: {0}")]
    Client(#[from] ChainClientError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("handler failed for {hash}:{output_index} in block {height}: {source}")]
    Handler {
        height: u64,
        hash: String,
        output_index: u32,
        #[source]
        source: HandlerError,
    },
}

/// Listener state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Polling,
    FetchingBlock(u64),
    ProcessingBlock(u64),
    Waiting,
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Block at this height fully handled and cursor persisted
    Committed(u64),
    /// Next block is not mined yet
    Waiting,
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub chain: Chain,
    pub params: NetworkParams,
    /// Delay in `Waiting` before polling again
    pub poll_interval: Duration,
}

impl ListenerConfig {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            chain: params.chain,
            params,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Listener statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub blocks_committed: u64,
    pub block_retries: u64,
    pub outputs_forwarded: u64,
}

/// Block-scanning listener for one chain
pub struct ChainListener {
    client: Arc<dyn ChainClient>,
    storage: Arc<dyn Storage>,
    handler: Arc<dyn TransactionHandler>,
    config: ListenerConfig,
    state: ListenerState,
    /// Height of the next block to process; resolved from storage on first poll
    next_height: Option<u64>,
    stats: ListenerStats,
}

impl ChainListener {
    pub fn new(
        client: Arc<dyn ChainClient>,
        storage: Arc<dyn Storage>,
        handler: Arc<dyn TransactionHandler>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            client,
            storage,
            handler,
            config,
            state: ListenerState::Idle,
            next_height: None,
            stats: ListenerStats::default(),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    /// Height the listener will process next, once initialized
    pub fn next_height(&self) -> Option<u64> {
        self.next_height
    }

    /// Resolve the starting height: stored cursor + 1, or the current tip
    /// when no cursor has been stored yet.
    async fn start_height(&self) -> Result<u64, ListenerError> {
        let cursor = self.storage.get_cursor(self.config.chain).await?;

        if cursor == 0 {
            let tip = self.client.current_height().await?;
            tracing::info!(
                target: "bridge::listener",
                chain = %self.config.chain,
                height = tip,
                "No stored cursor, starting from current tip"
            );
            Ok(tip)
        } else {
            tracing::info!(
                target: "bridge::listener",
                chain = %self.config.chain,
                cursor,
                "Resuming after stored cursor"
            );
            Ok(cursor + 1)
        }
    }

    /// Run a single poll cycle: process at most one block
    pub async fn run_once(&mut self) -> Result<CycleOutcome, ListenerError> {
        self.state = ListenerState::Polling;

        let height = match self.next_height {
            Some(height) => height,
            None => {
                let height = self.start_height().await?;
                self.next_height = Some(height);
                height
            }
        };

        let tip = self.client.current_height().await?;
        if height > tip {
            self.state = ListenerState::Waiting;
            return Ok(CycleOutcome::Waiting);
        }

        self.state = ListenerState::FetchingBlock(height);
        let hash = self.client.block_hash_at(height).await?;
        let block = self.client.block_by_hash(&hash).await?;

        self.state = ListenerState::ProcessingBlock(height);
        let transactions = extract_p2pkh_outputs(&block, &self.config.params);

        for transaction in &transactions {
            tracing::debug!(
                target: "bridge::listener",
                height,
                hash = %transaction.hash,
                output_index = transaction.output_index,
                to = %transaction.to_address,
                value = transaction.value_minor_units,
                "Forwarding output"
            );

            if let Err(source) = self.handler.handle(transaction).await {
                self.stats.block_retries += 1;
                log_block_event("block_retry", self.config.chain, height, transactions.len(), false);
                return Err(ListenerError::Handler {
                    height,
                    hash: transaction.hash.clone(),
                    output_index: transaction.output_index,
                    source,
                });
            }
        }

        self.storage
            .advance_cursor_if_greater(self.config.chain, height)
            .await?;

        self.next_height = Some(height + 1);
        self.stats.blocks_committed += 1;
        self.stats.outputs_forwarded += transactions.len() as u64;
        log_block_event("block_committed", self.config.chain, height, transactions.len(), true);

        Ok(CycleOutcome::Committed(height))
    }

    /// Run until `shutdown` flips to `true`
    ///
    /// Committed blocks are followed immediately by the next poll; waiting
    /// and failed cycles sleep for the poll interval first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        log_system_event(
            "listener_started",
            serde_json::json!({
                "chain": self.config.chain,
                "network": self.config.params.name,
                "poll_interval_ms": self.config.poll_interval.as_millis() as u64,
            }),
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.run_once().await {
                Ok(CycleOutcome::Committed(_)) => None,
                Ok(CycleOutcome::Waiting) => Some(self.config.poll_interval),
                Err(e) => {
                    tracing::warn!(
                        target: "bridge::listener",
                        chain = %self.config.chain,
                        next_height = ?self.next_height,
                        error = %e,
                        "Cycle failed, block will be retried"
                    );
                    Some(self.config.poll_interval)
                }
            };

            if let Some(delay) = delay {
                self.state = ListenerState::Waiting;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        self.state = ListenerState::Idle;
        log_system_event(
            "listener_stopped",
            serde_json::json!({
                "chain": self.config.chain,
                "next_height": self.next_height,
            }),
        );
    }
}
