//! Outbound Payment Queue
//!
//! The rail hands converted deposits to a [`PaymentQueue`]. Durable delivery
//! lives on the SQLite store (`payment_queue` table); [`MemoryPaymentQueue`]
//! backs tests and dry runs.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::storage::StorageError;
use crate::types::PaymentRequest;

pub use memory::MemoryPaymentQueue;

/// Queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is full")]
    QueueFull,

    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Queue storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Downstream payment queue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentQueue: Send + Sync {
    /// Append a payment request
    async fn enqueue(&self, request: PaymentRequest) -> Result<(), QueueError>;
}
