//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rental_backend::config::{IdManagerConfig, RetryConfig};
use rental_backend::error::{AppError, AppResult};
use rental_backend::store::{MemorySequenceStore, SequenceStore, SequenceTransaction};
use rental_backend::IdManagerService;
use shared::SequenceState;

/// How a [`FaultyStore`] misbehaves while it still has faults left
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `begin` and `count` return a store error
    Unavailable,
    /// `begin` never completes
    Hang,
}

/// Memory store that fails its first `n` transactions
#[derive(Clone)]
pub struct FaultyStore {
    inner: MemorySequenceStore,
    fault: Fault,
    remaining: Arc<AtomicU32>,
    begins: Arc<AtomicU32>,
}

impl FaultyStore {
    pub fn new(fault: Fault, failures: u32) -> Self {
        Self {
            inner: MemorySequenceStore::new(),
            fault,
            remaining: Arc::new(AtomicU32::new(failures)),
            begins: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of transactions attempted so far
    pub fn begins(&self) -> u32 {
        self.begins.load(Ordering::SeqCst)
    }

    fn take_fault(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SequenceStore for FaultyStore {
    async fn begin(&self) -> AppResult<Box<dyn SequenceTransaction>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        if self.take_fault() {
            match self.fault {
                Fault::Unavailable => {
                    return Err(AppError::StoreUnavailable("connection refused".to_string()))
                }
                Fault::Hang => std::future::pending::<()>().await,
            }
        }
        self.inner.begin().await
    }

    async fn get(&self, prefix: &str) -> AppResult<Option<SequenceState>> {
        self.inner.get(prefix).await
    }

    async fn list(&self) -> AppResult<Vec<SequenceState>> {
        self.inner.list().await
    }

    async fn count(&self) -> AppResult<i64> {
        if self.fault == Fault::Unavailable && self.remaining.load(Ordering::SeqCst) > 0 {
            return Err(AppError::StoreUnavailable("connection refused".to_string()));
        }
        self.inner.count().await
    }

    async fn delete(&self, prefix: &str) -> AppResult<bool> {
        self.inner.delete(prefix).await
    }

    async fn put(&self, prefix: &str, latest_id: &str) -> AppResult<()> {
        self.inner.put(prefix, latest_id).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }
}

/// Retry settings fast enough for tests
pub fn fast_retry(max_attempts: u32) -> IdManagerConfig {
    IdManagerConfig {
        health_check_prefix: "_HEALTH_CHECK_".to_string(),
        retry: RetryConfig {
            max_attempts,
            backoff_factor: 2.0,
            base_delay_ms: 1,
            attempt_timeout_ms: 50,
        },
    }
}

pub fn memory_service() -> (IdManagerService, MemorySequenceStore) {
    let store = MemorySequenceStore::new();
    let service = IdManagerService::new(Arc::new(store.clone()), fast_retry(3));
    (service, store)
}

/// Numeric run of an identifier such as `CONC-AAA0042`
pub fn numeric_part(id: &str) -> u64 {
    let (_, sequence) = id.rsplit_once('-').expect("identifier has a separator");
    sequence
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .expect("numeric run")
}
