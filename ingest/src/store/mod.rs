//! Key-value primitives used as the system of record.
//!
//! Every call is a separate round trip and there are no transactions. Callers
//! must tolerate a batch being partially applied.

mod keys;
mod memory;
#[cfg(test)]
pub(crate) mod testutils;
mod upstash;

pub use keys::Keyspace;
pub use memory::MemoryStore;
pub use upstash::UpstashStore;

use crate::config::{StoreBackend, StoreConfig};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store responded with status {0}")]
    Status(u16),

    #[error("store rejected `{command}`: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("unexpected reply to `{0}`")]
    UnexpectedReply(&'static str),

    #[error("key `{0}` holds a value of another type")]
    WrongType(String),

    #[error("value at `{0}` is not an integer")]
    NotAnInteger(String),
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Returns true when the member was not yet in the set.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Returns true when the field did not exist before.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError>;

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, StoreError>;

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Missing counters read as zero.
    async fn get_counter(&self, key: &str) -> Result<i64, StoreError>;

    /// Adds `(score, member)` pairs. Existing members get the new score.
    async fn sorted_add(&self, key: &str, entries: &[(u64, String)]) -> Result<(), StoreError>;

    /// Members with `min <= score <= max`, lowest score first.
    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<String>, StoreError>;

    /// Removes members scored strictly below `cutoff` and returns how many.
    async fn remove_scored_below(&self, key: &str, cutoff: u64) -> Result<u64, StoreError>;
}

pub fn build(config: &StoreConfig) -> Result<Arc<dyn StateStore>, StoreError> {
    match &config.backend {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store, state is lost on restart");
            Ok(Arc::new(MemoryStore::default()))
        }
        StoreBackend::Upstash {
            url,
            token,
            timeout_ms,
        } => {
            tracing::info!(%url, "using upstash store");
            Ok(Arc::new(UpstashStore::new(url.clone(), token, *timeout_ms)?))
        }
    }
}
