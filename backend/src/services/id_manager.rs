//! Sequential ID allocation service
//!
//! Hands out identifiers such as `PUR-AAA0001`, one independent sequence per
//! prefix. Each allocation runs in its own store transaction holding the
//! prefix's row lock from the initial fetch until commit, so concurrent
//! callers on one prefix are serialized while other prefixes proceed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::sequence::{self, SequenceParts};
use shared::SequenceState;

use crate::config::{IdManagerConfig, RetryConfig};
use crate::error::{AppError, AppResult};
use crate::store::{SequenceStore, SequenceTransaction};

/// ID allocation service
#[derive(Clone)]
pub struct IdManagerService {
    store: Arc<dyn SequenceStore>,
    config: IdManagerConfig,
}

/// Overall health of the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check result
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id_generated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Sequence details for operators
#[derive(Debug, Clone, Serialize)]
pub struct SequenceInfo {
    pub prefix: String,
    pub latest_id: String,
    /// `None` when the stored value is corrupt
    pub letters: Option<String>,
    pub numbers: Option<String>,
    /// What the next allocation will return
    pub next_id: String,
    /// The next allocation will restart the sequence
    pub reset_pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SequenceState> for SequenceInfo {
    fn from(state: SequenceState) -> Self {
        let parts = SequenceParts::parse(&state.latest_id, &state.prefix).ok();
        let preview = sequence::preview_next(&state.latest_id, &state.prefix);
        SequenceInfo {
            letters: parts.as_ref().map(|p| p.letters.clone()),
            numbers: parts.map(|p| p.numbers),
            next_id: preview.next_id,
            reset_pending: preview.reset,
            prefix: state.prefix,
            latest_id: state.latest_id,
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }
}

impl IdManagerService {
    /// Create a new IdManagerService instance
    pub fn new(store: Arc<dyn SequenceStore>, config: IdManagerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn SequenceStore> {
        &self.store
    }

    /// Prefix reserved for the health check's throwaway allocation
    pub fn health_check_prefix(&self) -> &str {
        &self.config.health_check_prefix
    }

    /// Atomically allocate the next identifier for `prefix`
    ///
    /// The first call for a prefix returns `{prefix}-AAA0001`. A stored
    /// value that no longer parses restarts the sequence at that value
    /// instead of failing the caller. Store failures are returned as is.
    pub async fn generate_id(&self, prefix: &str) -> AppResult<String> {
        let initial = sequence::initial_identifier(prefix);

        let mut tx = self.store.begin().await?;
        let (state, created) = tx.lock_or_create(prefix, &initial).await?;

        let next_id = if created {
            // Creating the row is the first allocation
            state.latest_id
        } else {
            let next_id = match sequence::next_identifier(&state.latest_id, prefix) {
                Ok(next_id) => next_id,
                Err(err) => {
                    tracing::warn!(
                        prefix = %prefix,
                        discarded = %state.latest_id,
                        reset_to = %initial,
                        error = %err,
                        "Corrupted sequence state, resetting"
                    );
                    initial
                }
            };
            tx.save(prefix, &next_id).await?;
            next_id
        };

        tx.commit().await?;

        tracing::debug!(prefix = %prefix, id = %next_id, "Allocated ID");
        Ok(next_id)
    }

    /// Allocate with a per-attempt timeout and bounded exponential backoff
    ///
    /// Only transient failures are retried. Gives up with
    /// [`AppError::IdGenerationTimeout`] when the last attempt timed out and
    /// [`AppError::IdGenerationFailed`] otherwise.
    pub async fn generate_id_with_retry(&self, prefix: &str) -> AppResult<String> {
        let retry: &RetryConfig = &self.config.retry;
        let max_attempts = retry.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            let result =
                match tokio::time::timeout(retry.attempt_timeout(), self.generate_id(prefix)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(AppError::IdGenerationTimeout {
                        prefix: prefix.to_string(),
                    }),
                };

            let err = match result {
                Ok(id) => return Ok(id),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= max_attempts {
                tracing::error!(
                    prefix = %prefix,
                    attempts = attempt,
                    error = %err,
                    "All ID generation attempts failed"
                );
                return Err(match err {
                    AppError::IdGenerationTimeout { .. } => err,
                    _ => AppError::IdGenerationFailed {
                        prefix: prefix.to_string(),
                        attempts: attempt,
                    },
                });
            }

            let delay = retry.delay(attempt - 1);
            tracing::warn!(
                prefix = %prefix,
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "ID generation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Allocate once against the reserved prefix and clean up after it
    ///
    /// Never fails: problems are reported in the returned report.
    pub async fn health_check(&self) -> HealthReport {
        match self.probe().await {
            Ok((prefix_count, test_id)) => HealthReport {
                status: HealthStatus::Healthy,
                message: "ID Manager service is operational".to_string(),
                prefix_count: Some(prefix_count),
                test_id_generated: Some(test_id),
                error_type: None,
                timestamp: Utc::now(),
            },
            Err(err) => {
                tracing::warn!(error = %err, "ID Manager health check failed");
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    message: format!("ID Manager service error: {}", err),
                    prefix_count: None,
                    test_id_generated: None,
                    error_type: Some(err.code().to_string()),
                    timestamp: Utc::now(),
                }
            }
        }
    }

    async fn probe(&self) -> AppResult<(i64, String)> {
        let prefix = self.health_check_prefix();
        let count = self.store.count().await?;

        let test_id = self.generate_id(prefix).await?;
        if test_id.is_empty() {
            return Err(AppError::Internal(
                "health check allocation returned an empty ID".to_string(),
            ));
        }

        self.store.delete(prefix).await?;
        Ok((count, test_id))
    }

    /// All sequences with their next-ID preview
    pub async fn list_sequences(&self) -> AppResult<Vec<SequenceInfo>> {
        let states = self.store.list().await?;
        Ok(states.into_iter().map(SequenceInfo::from).collect())
    }

    /// One sequence with its next-ID preview
    pub async fn get_sequence(&self, prefix: &str) -> AppResult<SequenceInfo> {
        self.store
            .get(prefix)
            .await?
            .map(SequenceInfo::from)
            .ok_or_else(|| AppError::NotFound(format!("Sequence {}", prefix)))
    }

    /// Operator overwrite of a sequence's latest ID, creating it when absent
    ///
    /// The value is stored as given. One that does not parse shows up as
    /// `reset_pending` and restarts the sequence on the next allocation.
    pub async fn set_sequence(&self, prefix: &str, latest_id: &str) -> AppResult<SequenceInfo> {
        self.reject_reserved_prefix(prefix)?;
        if latest_id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "latest_id must not be empty".to_string(),
            ));
        }

        self.store.put(prefix, latest_id).await?;
        tracing::info!(prefix = %prefix, latest_id = %latest_id, "Sequence overwritten");

        self.get_sequence(prefix).await
    }

    /// Operator removal of a sequence; the next allocation starts over
    pub async fn delete_sequence(&self, prefix: &str) -> AppResult<()> {
        self.reject_reserved_prefix(prefix)?;
        if !self.store.delete(prefix).await? {
            return Err(AppError::NotFound(format!("Sequence {}", prefix)));
        }

        tracing::info!(prefix = %prefix, "Sequence deleted");
        Ok(())
    }

    /// Reject operations on the health check's reserved prefix
    pub fn reject_reserved_prefix(&self, prefix: &str) -> AppResult<()> {
        if prefix == self.health_check_prefix() {
            return Err(AppError::ValidationError(format!(
                "Prefix {} is reserved for health checks",
                prefix
            )));
        }
        Ok(())
    }
}
