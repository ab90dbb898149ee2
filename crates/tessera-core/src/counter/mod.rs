//! Atomic per-type counters backing id generation.

#[cfg(feature = "redis")]
mod redis_store;

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

#[cfg(feature = "redis")]
pub use redis_store::RedisCounterStore;

use crate::error::CounterError;

pub type Result<T> = std::result::Result<T, CounterError>;

/// A hash of integer counters under string keys.
pub trait CounterStore: Send + Sync {
    /// Adds `delta` to `key.field` and returns the new value. A missing
    /// field starts at zero.
    fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    fn hget(&self, key: &str, field: &str) -> Result<Option<i64>>;

    /// Raises `key.field` to `value` if it is lower; returns the resulting value.
    fn hset_max(&self, key: &str, field: &str, value: i64) -> Result<i64>;
}

/// Process-local counter store.
#[derive(Default)]
pub struct MemoryCounterStore {
    hashes: Mutex<HashMap<String, HashMap<String, i64>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_field<R>(&self, key: &str, field: &str, f: impl FnOnce(&mut i64) -> R) -> R {
        let mut hashes = self.hashes.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = hashes
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(0);
        f(slot)
    }
}

impl CounterStore for MemoryCounterStore {
    fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.with_field(key, field, |v| {
            *v = v
                .checked_add(delta)
                .ok_or_else(|| CounterError::Unavailable(format!("{key}.{field} overflowed")))?;
            Ok(*v)
        })
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<i64>> {
        let hashes = self.hashes.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(hashes.get(key).and_then(|h| h.get(field)).copied())
    }

    fn hset_max(&self, key: &str, field: &str, value: i64) -> Result<i64> {
        Ok(self.with_field(key, field, |v| {
            *v = (*v).max(value);
            *v
        }))
    }
}
