//! Backend port (trait) and read options
//!
//! Backends differ only in how they make the condition check and the batch
//! insert atomic: the in-memory store serializes writers behind one lock,
//! the Postgres store uses serializable transactions or a global advisory
//! lock. The rest of the system never knows which mechanism is in play.

use async_trait::async_trait;
use dcb_core::{AppendCondition, AppendOutcome, Event, Query, Result, SequencedEvent};

/// Options for reading events.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Only return events with `sequence > from_sequence`. Default 0
    /// (start of the log).
    pub from_sequence: i64,

    /// Maximum number of events to return. None = unbounded.
    pub limit: Option<i64>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start after the given sequence position (exclusive floor).
    pub fn from_sequence(mut self, from_sequence: i64) -> Self {
        self.from_sequence = from_sequence;
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Storage backend for the append-only event log.
///
/// Contract shared by all implementations:
/// - `read` returns matching events ascending by sequence and never
///   mutates state; it sees a transactionally consistent snapshot.
/// - `highest_sequence` returns the maximum matching sequence, or 0.
/// - `append` assigns a contiguous, strictly increasing sequence run in
///   input order, evaluates the condition (if any) inside the same atomic
///   unit as the insert, and commits all events or none. No two
///   overlapping appends under conflicting conditions both succeed.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Read events matching `query`, ascending by sequence.
    async fn read(&self, query: &Query, options: ReadOptions) -> Result<Vec<SequencedEvent>>;

    /// Highest sequence position among events matching `query`, or 0.
    async fn highest_sequence(&self, query: &Query) -> Result<i64>;

    /// Append a batch, optionally guarded by a condition.
    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<&AppendCondition>,
    ) -> Result<AppendOutcome>;
}
