//! PostgreSQL sequence store
//!
//! Rows live in `id_sequences`. Allocation locks the prefix's row with
//! `SELECT ... FOR UPDATE` inside the caller's transaction; a fresh row
//! inserted by the same transaction is already locked by the insert.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::SequenceState;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

use super::{SequenceStore, SequenceTransaction};
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

/// Insert/select rounds before giving up on a row that keeps being deleted
const LOCK_ATTEMPTS: usize = 3;

#[derive(Debug, sqlx::FromRow)]
struct SequenceRow {
    prefix: String,
    latest_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SequenceRow> for SequenceState {
    fn from(row: SequenceRow) -> Self {
        SequenceState {
            prefix: row.prefix,
            latest_id: row.latest_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Sequence store backed by a Postgres pool
#[derive(Clone)]
pub struct PgSequenceStore {
    db: PgPool,
}

impl PgSequenceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the connection pool described by `config`
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        Ok(Self::new(db))
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl SequenceStore for PgSequenceStore {
    async fn begin(&self) -> AppResult<Box<dyn SequenceTransaction>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgSequenceTransaction { tx }))
    }

    async fn get(&self, prefix: &str) -> AppResult<Option<SequenceState>> {
        let row = sqlx::query_as::<_, SequenceRow>(
            r#"
            SELECT prefix, latest_id, created_at, updated_at
            FROM id_sequences
            WHERE prefix = $1
            "#,
        )
        .bind(prefix)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list(&self) -> AppResult<Vec<SequenceState>> {
        let rows = sqlx::query_as::<_, SequenceRow>(
            r#"
            SELECT prefix, latest_id, created_at, updated_at
            FROM id_sequences
            ORDER BY prefix
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM id_sequences")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn delete(&self, prefix: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM id_sequences WHERE prefix = $1")
            .bind(prefix)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn put(&self, prefix: &str, latest_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO id_sequences (prefix, latest_id)
            VALUES ($1, $2)
            ON CONFLICT (prefix)
            DO UPDATE SET latest_id = EXCLUDED.latest_id, updated_at = NOW()
            "#,
        )
        .bind(prefix)
        .bind(latest_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// Open Postgres transaction; rolls back when dropped uncommitted
pub struct PgSequenceTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SequenceTransaction for PgSequenceTransaction {
    async fn lock_or_create(
        &mut self,
        prefix: &str,
        default_id: &str,
    ) -> AppResult<(SequenceState, bool)> {
        for _ in 0..LOCK_ATTEMPTS {
            // A concurrent inserter of the same prefix blocks here until the
            // other transaction ends, then inserts nothing.
            let inserted = sqlx::query_as::<_, SequenceRow>(
                r#"
                INSERT INTO id_sequences (prefix, latest_id)
                VALUES ($1, $2)
                ON CONFLICT (prefix) DO NOTHING
                RETURNING prefix, latest_id, created_at, updated_at
                "#,
            )
            .bind(prefix)
            .bind(default_id)
            .fetch_optional(&mut *self.tx)
            .await?;

            if let Some(row) = inserted {
                return Ok((row.into(), true));
            }

            let locked = sqlx::query_as::<_, SequenceRow>(
                r#"
                SELECT prefix, latest_id, created_at, updated_at
                FROM id_sequences
                WHERE prefix = $1
                FOR UPDATE
                "#,
            )
            .bind(prefix)
            .fetch_optional(&mut *self.tx)
            .await?;

            match locked {
                Some(row) => return Ok((row.into(), false)),
                // Deleted between the insert and the select; insert again
                None => {
                    tracing::debug!(prefix = %prefix, "Sequence row vanished before lock, retrying");
                }
            }
        }

        Err(AppError::StoreUnavailable(format!(
            "sequence {} kept disappearing while being locked",
            prefix
        )))
    }

    async fn save(&mut self, prefix: &str, latest_id: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE id_sequences
            SET latest_id = $2, updated_at = NOW()
            WHERE prefix = $1
            "#,
        )
        .bind(prefix)
        .bind(latest_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Sequence {}", prefix)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
