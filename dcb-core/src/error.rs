//! Event store errors
//!
//! A denied append condition is *not* an error; see
//! [`crate::AppendOutcome`]. Errors here are either malformed input
//! (raised before any backend interaction), a retryable backend conflict,
//! or a fatal storage failure.

use thiserror::Error;

/// Errors surfaced by the store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// An append was called with an empty batch.
    #[error("event batch must not be empty")]
    EmptyBatch,

    /// An event carried an empty type string.
    #[error("event type must not be empty")]
    EmptyEventType,

    /// An event carried a tag with an empty key.
    #[error("tag keys must not be empty")]
    EmptyTagKey,

    /// The backend's own concurrency control aborted the transaction
    /// (serializable isolation). The attempt was inconclusive, not wrong:
    /// re-read and retry.
    #[error("transaction aborted by backend concurrency control, retry with a fresh read")]
    TransientConflict,

    /// Connectivity loss. Not retried by the core.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other database failure (corruption, schema mismatch, SQL
    /// errors). Not retried by the core.
    #[error("database error: {0}")]
    Database(String),

    /// Payload or row could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EventStoreError {
    /// Whether the caller may retry the same logical operation after a
    /// fresh read. Only transient backend conflicts qualify; validation
    /// and fatal storage errors never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EventStoreError::TransientConflict)
    }
}

impl From<serde_json::Error> for EventStoreError {
    fn from(err: serde_json::Error) -> Self {
        EventStoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EventStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_conflict_is_retryable() {
        assert!(EventStoreError::TransientConflict.is_retryable());
        assert!(!EventStoreError::EmptyBatch.is_retryable());
        assert!(!EventStoreError::Database("boom".into()).is_retryable());
        assert!(!EventStoreError::Connection("down".into()).is_retryable());
    }
}
