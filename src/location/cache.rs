//! Single-record position cache on top of a [`KeyValueStore`].
//!
//! Exactly one record exists, under a fixed key. It is overwritten on every
//! successful resolution and never deleted; staleness is decided at read time.

use super::store::KeyValueStore;
use super::types::{CachedRecord, LocationError, Position};
use std::sync::Arc;
use tracing::debug;

/// Storage key of the cached record.
pub const CACHE_KEY: &str = "geofix.position";

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// The cache accessor.
#[derive(Clone)]
pub struct PositionCache {
    store: Arc<dyn KeyValueStore>,
}

impl PositionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Raw record, regardless of age. `None` when absent or unparseable.
    pub fn peek(&self) -> Result<Option<CachedRecord>, LocationError> {
        let Some(raw) = self.store.read(CACHE_KEY)? else {
            return Ok(None);
        };
        match raw.parse::<CachedRecord>() {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                debug!(error = %e, "ignoring cached record");
                Ok(None)
            }
        }
    }

    /// Cached position if it is at most `max_age_ms` old at `now_millis`.
    /// An age equal to the limit still counts as fresh.
    pub fn read_at(&self, max_age_ms: u64, now_millis: i64) -> Result<Option<Position>, LocationError> {
        let Some(record) = self.peek()? else {
            return Ok(None);
        };

        let max_age = i64::try_from(max_age_ms).unwrap_or(i64::MAX);
        if record.age_millis(now_millis) > max_age {
            debug!(age_ms = record.age_millis(now_millis), max_age_ms, "cached record expired");
            return Ok(None);
        }
        Ok(Some(record.position()))
    }

    /// Same as [`read_at`](Self::read_at) against the wall clock.
    pub fn read(&self, max_age_ms: u64) -> Result<Option<Position>, LocationError> {
        self.read_at(max_age_ms, SystemClock.now_millis())
    }

    /// Overwrite the record.
    pub fn write(&self, position: Position, now_millis: i64) -> Result<(), LocationError> {
        let record = CachedRecord::new(position, now_millis);
        self.store.write(CACHE_KEY, &record.to_string())?;
        Ok(())
    }
}
