//! Storage Layer Module
//!
//! Provides persistence for block cursors, address associations, the
//! processed-transaction ledger and the durable payment queue.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AssociationStore, Storage, StorageError, StorageResult};

#[cfg(test)]
pub use traits::MockStorage;
