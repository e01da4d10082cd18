use super::{StateStore, StoreError};
use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug)]
enum Entry {
    Set(IndexSet<String>),
    Hash(IndexMap<String, String>),
    Counter(i64),
    Sorted(HashMap<String, u64>),
}

/// Process-local store. Sets and hashes enumerate in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

macro_rules! entry_as {
    ($entries:expr, $key:expr, $variant:ident, $default:expr) => {
        match $entries
            .entry($key.to_string())
            .or_insert_with(|| Entry::$variant($default))
        {
            Entry::$variant(value) => value,
            _ => return Err(StoreError::WrongType($key.to_string())),
        }
    };
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let set = entry_as!(entries, key, Set, IndexSet::new());
        Ok(set.insert(member.to_string()))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.entries.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let hash = entry_as!(entries, key, Hash, IndexMap::new());
        Ok(hash.insert(field.to_string(), value.to_string()).is_none())
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        match self.entries.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Hash(hash)) => Ok(hash
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock();
        let hash = entry_as!(entries, key, Hash, IndexMap::new());
        let current = match hash.get(field) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::NotAnInteger(format!("{key}/{field}")))?,
            None => 0,
        };
        let updated = current + delta;
        hash.insert(field.to_string(), updated.to_string());
        Ok(updated)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock();
        let counter = entry_as!(entries, key, Counter, 0);
        *counter += delta;
        Ok(*counter)
    }

    async fn get_counter(&self, key: &str) -> Result<i64, StoreError> {
        match self.entries.lock().get(key) {
            None => Ok(0),
            Some(Entry::Counter(value)) => Ok(*value),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn sorted_add(&self, key: &str, items: &[(u64, String)]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let sorted = entry_as!(entries, key, Sorted, HashMap::new());
        for (score, member) in items {
            sorted.insert(member.clone(), *score);
        }
        Ok(())
    }

    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock();
        let sorted = match entries.get(key) {
            None => return Ok(Vec::new()),
            Some(Entry::Sorted(sorted)) => sorted,
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };

        let mut in_range: Vec<(u64, &String)> = sorted
            .iter()
            .filter(|(_, score)| (min..=max).contains(*score))
            .map(|(member, score)| (*score, member))
            .collect();
        in_range.sort();
        Ok(in_range.into_iter().map(|(_, member)| member.clone()).collect())
    }

    async fn remove_scored_below(&self, key: &str, cutoff: u64) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock();
        let sorted = match entries.get_mut(key) {
            None => return Ok(0),
            Some(Entry::Sorted(sorted)) => sorted,
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };

        let before = sorted.len();
        sorted.retain(|_, score| *score >= cutoff);
        Ok((before - sorted.len()) as u64)
    }
}
