//! Persistent key-value store contract consumed by the workflow core.
//!
//! The machine only ever touches one key per workflow instance, so no
//! cross-key ordering or transactional guarantees are required of an
//! implementation. Reads never fail: a miss and an undecodable entry both
//! surface as `None`. Writes may fail, and the machine treats any write
//! failure as a signal to continue in memory only for the session.

use async_trait::async_trait;
use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by store writes. Both variants are recoverable from the
/// machine's point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage full while writing '{key}'")]
    Full { key: String },

    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Durable, string-keyed store scoped to the user's device.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the value for `key`. Misses and unreadable entries are both
    /// `None`; implementations log the latter.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`, replacing any prior entry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the entry for `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
