//! Persisted sequence state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row per prefix: the last identifier handed out for that prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    /// Caller-chosen key of the sequence, e.g. `PUR`
    pub prefix: String,
    /// Full last-issued identifier, e.g. `PUR-AAA0042`
    pub latest_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SequenceState {
    /// A state that has just been created with `latest_id`
    pub fn new(prefix: impl Into<String>, latest_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            prefix: prefix.into(),
            latest_id: latest_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
