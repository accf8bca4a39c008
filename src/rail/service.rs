//! Deposit Rail
//!
//! Registered as the listener's transaction handler. For every P2PKH output:
//!
//! 1. ignore values below the configured minimum
//! 2. ignore addresses with no association
//! 3. convert the value to the destination precision
//! 4. record `(chain, hash, address)` as processed; stop if it already was
//! 5. enqueue the payment
//! 6. notify subscribers of the address
//!
//! Steps 4 and 5 give the at-most-once guarantee per `(chain, hash, address)`.
//! Two outputs of one transaction paying the same address are therefore
//! credited once, for the first output seen.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::common::logging::log_deposit_event;
use crate::events::{BroadcastError, EventBroadcaster, EventType};
use crate::listener::{HandlerError, TransactionHandler};
use crate::queue::{PaymentQueue, QueueError};
use crate::storage::{Storage, StorageError};
use crate::types::{
    AssetCode, Chain, ConversionError, PaymentRequest, Transaction, ValueConverter,
    MINOR_UNITS_PER_COIN,
};

/// Rail errors
#[derive(Debug, Error)]
pub enum RailError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("notification failed: {0}")]
    Notification(#[from] BroadcastError),
}

impl RailError {
    /// Whether replaying the block may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RailError::Storage(StorageError::InvalidData(_)) => false,
            RailError::Storage(_) | RailError::Queue(_) | RailError::Notification(_) => true,
        }
    }
}

/// What to do when the post-enqueue notification fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyFailurePolicy {
    /// Log and report success; the payment is already queued
    #[default]
    BestEffort,
    /// Fail the handler call so the listener replays the block
    FailHandler,
}

impl FromStr for NotifyFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(NotifyFailurePolicy::BestEffort),
            "fail-handler" | "fail_handler" => Ok(NotifyFailurePolicy::FailHandler),
            _ => Err(format!("unknown notification policy: {}", s)),
        }
    }
}

/// Rail configuration
#[derive(Debug, Clone)]
pub struct RailConfig {
    pub chain: Chain,
    /// Smallest accepted deposit, in minor units
    pub minimum_value: u64,
    pub asset_code: AssetCode,
    pub converter: ValueConverter,
    pub notify_failure: NotifyFailurePolicy,
}

impl RailConfig {
    /// Defaults for `chain`: 1 coin minimum, 8 -> 7 decimals, best-effort notify
    pub fn for_chain(chain: Chain) -> Self {
        Self {
            chain,
            minimum_value: MINOR_UNITS_PER_COIN,
            asset_code: AssetCode::for_chain(chain),
            converter: ValueConverter::default(),
            notify_failure: NotifyFailurePolicy::BestEffort,
        }
    }
}

/// Result of handling one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RailOutcome {
    BelowMinimum,
    NotAssociated,
    /// Conversion to the destination precision was not exact
    PrecisionHalted,
    AlreadyProcessed,
    Queued { amount: String },
}

/// Deposit handler turning chain payments into queued outbound payments
pub struct DepositRail {
    config: RailConfig,
    storage: Arc<dyn Storage>,
    queue: Arc<dyn PaymentQueue>,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl DepositRail {
    pub fn new(
        config: RailConfig,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn PaymentQueue>,
        broadcaster: Arc<dyn EventBroadcaster>,
    ) -> Self {
        Self {
            config,
            storage,
            queue,
            broadcaster,
        }
    }

    pub fn config(&self) -> &RailConfig {
        &self.config
    }

    /// Run the decision pipeline for one transaction
    pub async fn process(&self, tx: &Transaction) -> Result<RailOutcome, RailError> {
        let chain = self.config.chain;

        if tx.value_minor_units < self.config.minimum_value {
            tracing::debug!(
                target: "bridge::rail",
                hash = %tx.hash,
                value = tx.value_minor_units,
                minimum = self.config.minimum_value,
                "Value below minimum, ignoring"
            );
            return Ok(RailOutcome::BelowMinimum);
        }

        let association = match self.storage.find_association(chain, &tx.to_address).await? {
            Some(association) => association,
            None => {
                tracing::debug!(
                    target: "bridge::rail",
                    hash = %tx.hash,
                    to = %tx.to_address,
                    "No association for address"
                );
                return Ok(RailOutcome::NotAssociated);
            }
        };

        let amount = match self.config.converter.to_target(tx.value_minor_units) {
            Ok(amount) => amount,
            Err(e) => return Ok(self.halt(tx, e)),
        };

        let already_processed = self
            .storage
            .insert_processed_if_absent(chain, &tx.hash, &tx.to_address)
            .await?;
        if already_processed {
            tracing::debug!(
                target: "bridge::rail",
                hash = %tx.hash,
                to = %tx.to_address,
                "Transaction already processed"
            );
            return Ok(RailOutcome::AlreadyProcessed);
        }

        let request = PaymentRequest {
            destination_account_key: association.destination_account_key.clone(),
            asset_code: self.config.asset_code.clone(),
            amount: amount.clone(),
            correlation_id: tx.hash.clone(),
        };

        if let Err(e) = self.queue.enqueue(request).await {
            log_deposit_event(
                "enqueue_failed",
                &tx.hash,
                &tx.to_address,
                tx.value_minor_units,
                false,
                Some(&e.to_string()),
            );
            return Err(e.into());
        }

        log_deposit_event(
            "payment_queued",
            &tx.hash,
            &tx.to_address,
            tx.value_minor_units,
            true,
            None,
        );

        self.notify(tx, &amount).await?;

        Ok(RailOutcome::Queued { amount })
    }

    /// Precision loss halts this deposit only: nothing is recorded so it can
    /// be replayed once the precision configuration is fixed.
    fn halt(&self, tx: &Transaction, error: ConversionError) -> RailOutcome {
        log_deposit_event(
            "deposit_halted",
            &tx.hash,
            &tx.to_address,
            tx.value_minor_units,
            false,
            Some(&error.to_string()),
        );
        RailOutcome::PrecisionHalted
    }

    async fn notify(&self, tx: &Transaction, amount: &str) -> Result<(), RailError> {
        let payload = serde_json::json!({
            "transaction_hash": tx.hash,
            "asset_code": self.config.asset_code,
            "amount": amount,
        })
        .to_string();

        let result = self
            .broadcaster
            .broadcast(
                &tx.to_address,
                EventType::TransactionReceived,
                payload.as_bytes(),
            )
            .await;

        match (result, self.config.notify_failure) {
            (Ok(()), _) => Ok(()),
            (Err(e), NotifyFailurePolicy::BestEffort) => {
                tracing::warn!(
                    target: "bridge::rail",
                    hash = %tx.hash,
                    to = %tx.to_address,
                    error = %e,
                    "Notification failed, payment already queued"
                );
                Ok(())
            }
            (Err(e), NotifyFailurePolicy::FailHandler) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TransactionHandler for DepositRail {
    async fn handle(&self, transaction: &Transaction) -> Result<(), HandlerError> {
        self.process(transaction).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MockEventBroadcaster;
    use crate::queue::MockPaymentQueue;
    use crate::storage::MockStorage;
    use crate::types::AddressAssociation;

    const HASH: &str = "109fa1c369680c2f27643fdd160620d010851a376d25b9b00ef71afe789ea6ed";
    const ADDRESS: &str = "Lhd98J63jWM44tY8tcGPcvCdRDruDadyJj";
    const ACCOUNT: &str = "GDULKYRRVOMASFMXBYD4BYFRSHAKQDREEVVP2TMH2CER3DW2KATIOASB";

    fn transaction(value: u64) -> Transaction {
        Transaction {
            hash: HASH.to_string(),
            output_index: 0,
            value_minor_units: value,
            to_address: ADDRESS.to_string(),
        }
    }

    fn association() -> AddressAssociation {
        AddressAssociation::new(Chain::Litecoin, 1, ADDRESS.to_string(), ACCOUNT.to_string())
    }

    fn rail(
        config: RailConfig,
        storage: MockStorage,
        queue: MockPaymentQueue,
        broadcaster: MockEventBroadcaster,
    ) -> DepositRail {
        DepositRail::new(config, Arc::new(storage), Arc::new(queue), Arc::new(broadcaster))
    }

    fn associated_storage(already_processed: bool) -> MockStorage {
        let mut storage = MockStorage::new();
        storage
            .expect_find_association()
            .withf(|chain, address| *chain == Chain::Litecoin && address == ADDRESS)
            .times(1)
            .returning(|_, _| Ok(Some(association())));
        storage
            .expect_insert_processed_if_absent()
            .withf(|chain, hash, address| {
                *chain == Chain::Litecoin && hash == HASH && address == ADDRESS
            })
            .times(1)
            .returning(move |_, _, _| Ok(already_processed));
        storage
    }

    #[tokio::test]
    async fn test_below_minimum_is_ignored() {
        let mut storage = MockStorage::new();
        storage.expect_find_association().never();
        storage.expect_insert_processed_if_absent().never();
        let mut queue = MockPaymentQueue::new();
        queue.expect_enqueue().never();

        let rail = rail(
            RailConfig::for_chain(Chain::Litecoin),
            storage,
            queue,
            MockEventBroadcaster::new(),
        );

        let outcome = rail.process(&transaction(50_000_000)).await.unwrap();
        assert_eq!(outcome, RailOutcome::BelowMinimum);
    }

    #[tokio::test]
    async fn test_unassociated_address_is_ignored() {
        let mut storage = MockStorage::new();
        storage
            .expect_find_association()
            .times(1)
            .returning(|_, _| Ok(None));
        storage.expect_insert_processed_if_absent().never();
        let mut queue = MockPaymentQueue::new();
        queue.expect_enqueue().never();

        let rail = rail(
            RailConfig::for_chain(Chain::Litecoin),
            storage,
            queue,
            MockEventBroadcaster::new(),
        );

        let outcome = rail.process(&transaction(100_000_000)).await.unwrap();
        assert_eq!(outcome, RailOutcome::NotAssociated);
    }

    #[tokio::test]
    async fn test_already_processed_is_not_queued() {
        let mut queue = MockPaymentQueue::new();
        queue.expect_enqueue().never();
        let mut broadcaster = MockEventBroadcaster::new();
        broadcaster.expect_broadcast().never();

        let rail = rail(
            RailConfig::for_chain(Chain::Litecoin),
            associated_storage(true),
            queue,
            broadcaster,
        );

        let outcome = rail.process(&transaction(100_000_000)).await.unwrap();
        assert_eq!(outcome, RailOutcome::AlreadyProcessed);
    }

    #[tokio::test]
    async fn test_new_deposit_is_queued_and_broadcast() {
        let mut queue = MockPaymentQueue::new();
        queue
            .expect_enqueue()
            .withf(|request| {
                request.correlation_id == HASH
                    && request.asset_code.as_str() == "LTC"
                    && request.amount == "1.0000000"
                    && request.destination_account_key == ACCOUNT
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut broadcaster = MockEventBroadcaster::new();
        broadcaster
            .expect_broadcast()
            .withf(|topic, event_type, payload| {
                topic == ADDRESS
                    && *event_type == EventType::TransactionReceived
                    && String::from_utf8_lossy(payload).contains(HASH)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let rail = rail(
            RailConfig::for_chain(Chain::Litecoin),
            associated_storage(false),
            queue,
            broadcaster,
        );

        let outcome = rail.process(&transaction(100_000_000)).await.unwrap();
        assert_eq!(
            outcome,
            RailOutcome::Queued {
                amount: "1.0000000".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_queue_failure_fails_handler() {
        let mut queue = MockPaymentQueue::new();
        queue
            .expect_enqueue()
            .times(1)
            .returning(|_| Err(QueueError::Unavailable("connection refused".to_string())));
        let mut broadcaster = MockEventBroadcaster::new();
        broadcaster.expect_broadcast().never();

        let rail = rail(
            RailConfig::for_chain(Chain::Litecoin),
            associated_storage(false),
            queue,
            broadcaster,
        );

        let err = rail.handle(&transaction(100_000_000)).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_notification_failure_policies() {
        for (policy, expect_ok) in [
            (NotifyFailurePolicy::BestEffort, true),
            (NotifyFailurePolicy::FailHandler, false),
        ] {
            let mut queue = MockPaymentQueue::new();
            queue.expect_enqueue().times(1).returning(|_| Ok(()));
            let mut broadcaster = MockEventBroadcaster::new();
            broadcaster
                .expect_broadcast()
                .times(1)
                .returning(|_, _, _| Err(BroadcastError::Unavailable("closed".to_string())));

            let mut config = RailConfig::for_chain(Chain::Litecoin);
            config.notify_failure = policy;
            let rail = rail(config, associated_storage(false), queue, broadcaster);

            assert_eq!(rail.handle(&transaction(100_000_000)).await.is_ok(), expect_ok);
        }
    }

    #[tokio::test]
    async fn test_precision_loss_halts_without_record() {
        let mut storage = MockStorage::new();
        storage
            .expect_find_association()
            .times(2)
            .returning(|_, _| Ok(Some(association())));
        storage.expect_insert_processed_if_absent().never();
        let mut queue = MockPaymentQueue::new();
        queue.expect_enqueue().never();

        let rail = rail(
            RailConfig::for_chain(Chain::Litecoin),
            storage,
            queue,
            MockEventBroadcaster::new(),
        );

        // last litoshi digit cannot be represented at 7 decimals
        let outcome = rail.process(&transaction(100_000_001)).await.unwrap();
        assert_eq!(outcome, RailOutcome::PrecisionHalted);
        assert!(rail.handle(&transaction(100_000_001)).await.is_ok());
    }

    #[test]
    fn test_notify_policy_parsing() {
        assert_eq!(
            "best-effort".parse::<NotifyFailurePolicy>(),
            Ok(NotifyFailurePolicy::BestEffort)
        );
        assert_eq!(
            "FAIL_HANDLER".parse::<NotifyFailurePolicy>(),
            Ok(NotifyFailurePolicy::FailHandler)
        );
        assert!("sometimes".parse::<NotifyFailurePolicy>().is_err());
    }
}
