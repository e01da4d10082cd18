use super::{MemoryStore, StateStore, StoreError};
use async_trait::async_trait;

/// A `MemoryStore` with knobs for behaviour a remote store can show.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    /// `set_add` and `hash_set` fail for this member.
    pub failing_member: Option<String>,
    /// `set_members` enumerates newest first instead of in insertion order.
    pub reverse_members: bool,
}

impl ScriptedStore {
    fn check_member(&self, member: &str) -> Result<(), StoreError> {
        match &self.failing_member {
            Some(failing) if failing == member => Err(StoreError::Status(503)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StateStore for ScriptedStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check_member(member)?;
        self.inner.set_add(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut members = self.inner.set_members(key).await?;
        if self.reverse_members {
            members.reverse();
        }
        Ok(members)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        self.check_member(field)?;
        self.inner.hash_set(key, field, value).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.inner.hash_incr_by(key, field, delta).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.inner.incr_by(key, delta).await
    }

    async fn get_counter(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.get_counter(key).await
    }

    async fn sorted_add(&self, key: &str, entries: &[(u64, String)]) -> Result<(), StoreError> {
        self.inner.sorted_add(key, entries).await
    }

    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<String>, StoreError> {
        self.inner.sorted_range_by_score(key, min, max).await
    }

    async fn remove_scored_below(&self, key: &str, cutoff: u64) -> Result<u64, StoreError> {
        self.inner.remove_scored_below(key, cutoff).await
    }
}
