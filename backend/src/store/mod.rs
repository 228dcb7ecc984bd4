//! Persistence of per-prefix sequence state
//!
//! Allocation needs an exclusive, transaction-scoped lock on one prefix's
//! row for the whole read-increment-write cycle. [`SequenceStore`] hands out
//! [`SequenceTransaction`]s that hold that lock from
//! [`SequenceTransaction::lock_or_create`] until commit or drop. Dropping a
//! transaction without committing rolls it back.
//!
//! Locks are per prefix: transactions on different prefixes never wait on
//! each other.

use async_trait::async_trait;
use shared::SequenceState;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemorySequenceStore;
pub use postgres::PgSequenceStore;

/// Shared handle to the sequence table
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> AppResult<Box<dyn SequenceTransaction>>;

    /// Committed state for `prefix`, without locking
    async fn get(&self, prefix: &str) -> AppResult<Option<SequenceState>>;

    /// All committed sequences ordered by prefix
    async fn list(&self) -> AppResult<Vec<SequenceState>>;

    /// Number of prefixes ever allocated and not deleted
    async fn count(&self) -> AppResult<i64>;

    /// Remove a prefix's row; returns whether one existed
    async fn delete(&self, prefix: &str) -> AppResult<bool>;

    /// Administrative overwrite of a prefix's `latest_id`, creating the row
    /// when absent. Bypasses allocation and its validation.
    async fn put(&self, prefix: &str, latest_id: &str) -> AppResult<()>;

    /// Cheap reachability check
    async fn ping(&self) -> AppResult<()>;
}

/// A unit of work holding row locks until commit
#[async_trait]
pub trait SequenceTransaction: Send {
    /// Fetch the row for `prefix`, creating it with `default_id` when absent.
    ///
    /// The row is exclusively locked until this transaction ends. The flag
    /// is `true` when the row was created by this call.
    async fn lock_or_create(
        &mut self,
        prefix: &str,
        default_id: &str,
    ) -> AppResult<(SequenceState, bool)>;

    /// Overwrite `latest_id` of a row locked by this transaction
    async fn save(&mut self, prefix: &str, latest_id: &str) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
