//! Event broadcasting
//!
//! Uses tokio broadcast channels for pub/sub. Subscribers filter by topic
//! (the deposit address).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Broadcast errors
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcaster unavailable: {0}")]
    Unavailable(String),
}

/// Kinds of events pushed to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A payment to the subscribed address has been queued
    TransactionReceived,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TransactionReceived => "transaction_received",
        }
    }
}

/// One published event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    pub topic: String,
    pub event_type: EventType,
    pub payload: Vec<u8>,
}

/// Push-notification collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn broadcast(
        &self,
        topic: &str,
        event_type: EventType,
        payload: &[u8],
    ) -> Result<(), BroadcastError>;
}

/// In-process broadcaster backed by a tokio broadcast channel
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<BridgeEvent>,
}

impl ChannelBroadcaster {
    /// Create a broadcaster with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl EventBroadcaster for ChannelBroadcaster {
    async fn broadcast(
        &self,
        topic: &str,
        event_type: EventType,
        payload: &[u8],
    ) -> Result<(), BroadcastError> {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(BridgeEvent {
            topic: topic.to_string(),
            event_type,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
