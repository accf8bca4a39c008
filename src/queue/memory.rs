//! In-memory payment queue

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{PaymentQueue, QueueError};
use crate::types::PaymentRequest;

/// Bounded in-memory queue. Data is lost on restart.
#[derive(Clone)]
pub struct MemoryPaymentQueue {
    requests: Arc<RwLock<Vec<PaymentRequest>>>,
    max_size: usize,
}

impl MemoryPaymentQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            requests: Arc::new(RwLock::new(Vec::new())),
            max_size,
        }
    }

    /// Snapshot of everything enqueued, in order
    pub async fn payments(&self) -> Vec<PaymentRequest> {
        self.requests.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

impl Default for MemoryPaymentQueue {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl PaymentQueue for MemoryPaymentQueue {
    async fn enqueue(&self, request: PaymentRequest) -> Result<(), QueueError> {
        let mut requests = self.requests.write().await;

        if requests.len() >= self.max_size {
            return Err(QueueError::QueueFull);
        }

        requests.push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetCode;

    fn request(correlation_id: &str) -> PaymentRequest {
        PaymentRequest {
            destination_account_key: "GDULKYRRVOMASFMXBYD4BYFRSHAKQDREEVVP2TMH2CER3DW2KATIOASB"
                .to_string(),
            asset_code: AssetCode::new("LTC"),
            amount: "1.0000000".to_string(),
            correlation_id: correlation_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order() {
        let queue = MemoryPaymentQueue::default();
        queue.enqueue(request("a")).await.unwrap();
        queue.enqueue(request("b")).await.unwrap();

        let ids: Vec<String> = queue
            .payments()
            .await
            .into_iter()
            .map(|p| p.correlation_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_queue_full() {
        let queue = MemoryPaymentQueue::new(1);
        queue.enqueue(request("a")).await.unwrap();
        assert!(matches!(
            queue.enqueue(request("b")).await,
            Err(QueueError::QueueFull)
        ));
        assert_eq!(queue.len().await, 1);
    }
}
