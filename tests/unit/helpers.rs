//! Shared fixtures

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use homepage::errors::StorageError;
use homepage::stats::{site_epoch, Clock};
use homepage::storage::{MemoryStorage, Storage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A clock frozen at `epoch + offset`.
pub fn frozen_clock(offset: ChronoDuration) -> Clock {
    let at: DateTime<Utc> = site_epoch() + offset;
    Arc::new(move || at)
}

/// One day, two hours and three minutes after the epoch.
pub fn day_later() -> Clock {
    frozen_clock(ChronoDuration::days(1) + ChronoDuration::hours(2) + ChronoDuration::minutes(3))
}

/// Memory storage whose first `failures` writes fail.
#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    failures: AtomicUsize,
}

impl FlakyStorage {
    pub fn new(inner: MemoryStorage, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

impl Storage for FlakyStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Io {
                path: "quota".into(),
                message: "quota exceeded".into(),
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}
