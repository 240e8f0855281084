//! Time-to-live caches for expensive remote results.
//!
//! Expiration is lazy: [`Cache::get`] treats an expired entry as absent and no
//! background task sweeps the store. Entry timestamps always come from the
//! cache's own [`Clock`], never from the caller.

mod file;
mod memory;

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::CacheError;

pub use file::FileCache;
pub use memory::MemCache;

/// Source of the current instant, injectable for deterministic tests.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = plus(*now, by);
    }

    pub fn set(&self, instant: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(OffsetDateTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cached value with the instants it was stored at and stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub creation_time: OffsetDateTime,
    pub expiration_time: OffsetDateTime,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, creation_time: OffsetDateTime, ttl: Duration) -> Self {
        Self {
            value,
            creation_time,
            expiration_time: plus(creation_time, ttl),
        }
    }

    /// An entry is expired once `now` is no longer strictly before its expiration.
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.expiration_time
    }
}

fn plus(instant: OffsetDateTime, by: Duration) -> OffsetDateTime {
    let by = time::Duration::try_from(by).unwrap_or(time::Duration::MAX);
    instant.saturating_add(by)
}

/// Keyed store of values with a time-to-live.
///
/// Ordinary misses are `Ok(None)`. Errors are reserved for misconfiguration
/// and persistence failures.
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    /// Stores `value`, overwriting any earlier entry for `key`.
    fn put(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError>;
}

/// Cache that never stores anything.
pub struct NoopCache<V>(PhantomData<fn() -> V>);

impl<V> NoopCache<V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for NoopCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Debug for NoopCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NoopCache")
    }
}

impl<V> Cache<V> for NoopCache<V> {
    fn get(&self, _key: &str) -> Result<Option<V>, CacheError> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: V, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}
