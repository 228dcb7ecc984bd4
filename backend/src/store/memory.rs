//! In-process sequence store
//!
//! Each prefix owns an async mutex; a transaction keeps the owned guard
//! until it is committed or dropped, which gives the same per-prefix
//! serialization as a row lock. Writes are buffered in the transaction and
//! only become visible on commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use shared::SequenceState;
use tokio::sync::OwnedMutexGuard;

use super::{SequenceStore, SequenceTransaction};
use crate::error::{AppError, AppResult};

type RowLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
struct Inner {
    rows: Mutex<BTreeMap<String, SequenceState>>,
    locks: Mutex<HashMap<String, RowLock>>,
}

impl Inner {
    fn rows(&self) -> AppResult<MutexGuard<'_, BTreeMap<String, SequenceState>>> {
        self.rows
            .lock()
            .map_err(|_| AppError::Internal("sequence rows mutex poisoned".to_string()))
    }

    fn row_lock(&self, prefix: &str) -> AppResult<RowLock> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppError::Internal("sequence locks mutex poisoned".to_string()))?;
        Ok(locks.entry(prefix.to_string()).or_default().clone())
    }

    /// Forget the row lock of a deleted prefix unless someone else holds or
    /// waits on it. The caller holds the lock, so the map entry plus the
    /// caller's guard account for two references.
    fn release_row_lock(&self, prefix: &str) -> AppResult<()> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppError::Internal("sequence locks mutex poisoned".to_string()))?;
        if locks
            .get(prefix)
            .is_some_and(|lock| Arc::strong_count(lock) == 2)
        {
            locks.remove(prefix);
        }
        Ok(())
    }
}

/// Sequence store kept in process memory
///
/// Only serializes callers within one process; use [`super::PgSequenceStore`]
/// when several server processes allocate from the same sequences.
#[derive(Clone, Default)]
pub struct MemorySequenceStore {
    inner: Arc<Inner>,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn begin(&self) -> AppResult<Box<dyn SequenceTransaction>> {
        Ok(Box::new(MemorySequenceTransaction {
            store: self.inner.clone(),
            guards: HashMap::new(),
            pending: HashMap::new(),
        }))
    }

    async fn get(&self, prefix: &str) -> AppResult<Option<SequenceState>> {
        Ok(self.inner.rows()?.get(prefix).cloned())
    }

    async fn list(&self) -> AppResult<Vec<SequenceState>> {
        Ok(self.inner.rows()?.values().cloned().collect())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.inner.rows()?.len() as i64)
    }

    async fn delete(&self, prefix: &str) -> AppResult<bool> {
        // Wait for an in-flight allocation on this prefix to finish
        let guard = self.inner.row_lock(prefix)?.lock_owned().await;
        let removed = self.inner.rows()?.remove(prefix).is_some();
        self.inner.release_row_lock(prefix)?;
        drop(guard);
        Ok(removed)
    }

    async fn put(&self, prefix: &str, latest_id: &str) -> AppResult<()> {
        let _guard = self.inner.row_lock(prefix)?.lock_owned().await;
        let mut rows = self.inner.rows()?;
        match rows.get_mut(prefix) {
            Some(state) => {
                state.latest_id = latest_id.to_string();
                state.updated_at = Utc::now();
            }
            None => {
                rows.insert(prefix.to_string(), SequenceState::new(prefix, latest_id));
            }
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.rows().map(|_| ())
    }
}

/// Transaction over a [`MemorySequenceStore`]
pub struct MemorySequenceTransaction {
    store: Arc<Inner>,
    guards: HashMap<String, OwnedMutexGuard<()>>,
    /// Rows created or saved by this transaction, applied on commit
    pending: HashMap<String, SequenceState>,
}

#[async_trait]
impl SequenceTransaction for MemorySequenceTransaction {
    async fn lock_or_create(
        &mut self,
        prefix: &str,
        default_id: &str,
    ) -> AppResult<(SequenceState, bool)> {
        if !self.guards.contains_key(prefix) {
            let guard = self.store.row_lock(prefix)?.lock_owned().await;
            self.guards.insert(prefix.to_string(), guard);
        }

        if let Some(state) = self.pending.get(prefix) {
            return Ok((state.clone(), false));
        }

        let committed = self.store.rows()?.get(prefix).cloned();
        match committed {
            Some(state) => Ok((state, false)),
            None => {
                let state = SequenceState::new(prefix, default_id);
                self.pending.insert(prefix.to_string(), state.clone());
                Ok((state, true))
            }
        }
    }

    async fn save(&mut self, prefix: &str, latest_id: &str) -> AppResult<()> {
        if !self.guards.contains_key(prefix) {
            return Err(AppError::Internal(format!(
                "sequence {} saved without being locked",
                prefix
            )));
        }

        let current = match self.pending.get(prefix) {
            Some(state) => Some(state.clone()),
            None => self.store.rows()?.get(prefix).cloned(),
        };
        let mut state = current.ok_or_else(|| AppError::NotFound(format!("Sequence {}", prefix)))?;

        state.latest_id = latest_id.to_string();
        state.updated_at = Utc::now();
        self.pending.insert(prefix.to_string(), state);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self {
            store,
            guards,
            pending,
        } = *self;

        store.rows()?.extend(pending);
        // Release row locks only after the writes are visible
        drop(guards);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncommitted_creation_is_rolled_back() {
        let store = MemorySequenceStore::new();

        let mut tx = store.begin().await.unwrap();
        let (state, created) = tx.lock_or_create("PUR", "PUR-AAA0001").await.unwrap();
        assert!(created);
        assert_eq!(state.latest_id, "PUR-AAA0001");
        drop(tx);

        assert!(store.get("PUR").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_makes_save_visible() {
        let store = MemorySequenceStore::new();
        store.put("PUR", "PUR-AAA0001").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let (_, created) = tx.lock_or_create("PUR", "PUR-AAA0001").await.unwrap();
        assert!(!created);
        tx.save("PUR", "PUR-AAA0002").await.unwrap();

        // Not visible before commit
        assert_eq!(store.get("PUR").await.unwrap().unwrap().latest_id, "PUR-AAA0001");

        tx.commit().await.unwrap();
        assert_eq!(store.get("PUR").await.unwrap().unwrap().latest_id, "PUR-AAA0002");
    }

    #[tokio::test]
    async fn test_save_requires_lock() {
        let store = MemorySequenceStore::new();
        store.put("PUR", "PUR-AAA0001").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx.save("PUR", "PUR-AAA0002").await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_second_transaction_waits_for_lock() {
        let store = MemorySequenceStore::new();

        let mut first = store.begin().await.unwrap();
        first.lock_or_create("PUR", "PUR-AAA0001").await.unwrap();

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let mut tx = contender.begin().await.unwrap();
            let (state, created) = tx.lock_or_create("PUR", "PUR-AAA0001").await.unwrap();
            tx.commit().await.unwrap();
            (state.latest_id, created)
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        first.save("PUR", "PUR-AAA0002").await.unwrap();
        first.commit().await.unwrap();

        let (latest_id, created) = waiter.await.unwrap();
        assert_eq!(latest_id, "PUR-AAA0002");
        assert!(!created);
    }

    #[tokio::test]
    async fn test_other_prefix_does_not_wait() {
        let store = MemorySequenceStore::new();

        let mut first = store.begin().await.unwrap();
        first.lock_or_create("PUR", "PUR-AAA0001").await.unwrap();

        let mut second = store.begin().await.unwrap();
        let (state, created) = second.lock_or_create("SAL", "SAL-AAA0001").await.unwrap();
        assert!(created);
        assert_eq!(state.prefix, "SAL");
        second.commit().await.unwrap();

        first.commit().await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_delete_removes() {
        let store = MemorySequenceStore::new();
        store.put("SAL", "SAL-AAA0003").await.unwrap();
        store.put("PUR", "PUR-AAA0001").await.unwrap();

        let prefixes: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.prefix)
            .collect();
        assert_eq!(prefixes, vec!["PUR", "SAL"]);

        assert!(store.delete("PUR").await.unwrap());
        assert!(!store.delete("PUR").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    fn lock_entries(store: &MemorySequenceStore) -> usize {
        store.inner.locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_delete_forgets_row_lock() {
        let store = MemorySequenceStore::new();

        for _ in 0..3 {
            let mut tx = store.begin().await.unwrap();
            tx.lock_or_create("_HEALTH_CHECK_", "_HEALTH_CHECK_-AAA0001")
                .await
                .unwrap();
            tx.commit().await.unwrap();
            store.delete("_HEALTH_CHECK_").await.unwrap();
        }
        assert_eq!(lock_entries(&store), 0);

        store.put("PUR", "PUR-AAA0001").await.unwrap();
        assert_eq!(lock_entries(&store), 1);
        store.delete("PUR").await.unwrap();
        assert_eq!(lock_entries(&store), 0);
    }

    #[tokio::test]
    async fn test_delete_keeps_row_lock_with_waiter() {
        let store = MemorySequenceStore::new();
        store.put("PUR", "PUR-AAA0001").await.unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.lock_or_create("PUR", "PUR-AAA0001").await.unwrap();

        let deleter = store.clone();
        let delete = tokio::spawn(async move { deleter.delete("PUR").await.unwrap() });
        tokio::task::yield_now().await;

        let allocator = store.clone();
        let allocate = tokio::spawn(async move {
            let mut tx = allocator.begin().await.unwrap();
            let (state, created) = tx.lock_or_create("PUR", "PUR-AAA0001").await.unwrap();
            tx.commit().await.unwrap();
            (state.latest_id, created)
        });
        tokio::task::yield_now().await;
        assert!(!delete.is_finished());
        assert!(!allocate.is_finished());

        holder.commit().await.unwrap();
        assert!(delete.await.unwrap());

        // The queued allocation still serializes on the same lock
        let (latest_id, created) = allocate.await.unwrap();
        assert_eq!(latest_id, "PUR-AAA0001");
        assert!(created);
        assert_eq!(lock_entries(&store), 1);
    }
}
