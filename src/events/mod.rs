//! Deposit Notifications
//!
//! Best-effort push of "transaction received" events to clients watching a
//! deposit address, over Server-Sent Events.

pub mod broadcaster;
pub mod sse;

pub use broadcaster::{BridgeEvent, BroadcastError, ChannelBroadcaster, EventBroadcaster, EventType};
pub use sse::{create_events_router, start_events_server};

#[cfg(test)]
pub use broadcaster::MockEventBroadcaster;
