//! In-memory event log
//!
//! Used for testing and development without a database, and as the
//! reference implementation of the single-writer-serialization strategy:
//! the write lock is the global serialization point, so the
//! read-check-insert sequence needs no further coordination. Readers take
//! the read lock and copy a snapshot; they are never blocked by a writer
//! beyond the lock hold itself.

use crate::backend::{EventLog, ReadOptions};
use async_trait::async_trait;
use chrono::Utc;
use dcb_core::{
    highest_sequence, AppendCondition, AppendOutcome, Event, Query, Result, SequenceRange,
    SequencedEvent,
};
use std::sync::RwLock;
use tracing::{debug, warn};

/// In-memory event log for tests and embedded use.
pub struct MemoryStore {
    // Sorted by sequence by construction: appends only push increasing
    // sequence values.
    events: RwLock<Vec<SequencedEvent>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Number of events in the log.
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Clear all events (useful for test setup).
    pub fn clear(&self) {
        self.events.write().unwrap().clear();
    }

    fn next_sequence(events: &[SequencedEvent]) -> i64 {
        events.last().map(|e| e.sequence).unwrap_or(0) + 1
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for MemoryStore {
    async fn read(&self, query: &Query, options: ReadOptions) -> Result<Vec<SequencedEvent>> {
        let events = self.events.read().unwrap();
        let iter = events
            .iter()
            .filter(|stored| stored.sequence > options.from_sequence)
            .filter(|stored| query.matches(&stored.event))
            .cloned();

        Ok(match options.limit {
            Some(limit) => iter.take(limit.max(0) as usize).collect(),
            None => iter.collect(),
        })
    }

    async fn highest_sequence(&self, query: &Query) -> Result<i64> {
        let events = self.events.read().unwrap();
        Ok(highest_sequence(events.iter(), query))
    }

    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<&AppendCondition>,
    ) -> Result<AppendOutcome> {
        // Single global serialization point: no other writer can
        // interleave between the condition check and the insert.
        let mut log = self.events.write().unwrap();

        if let Some(condition) = condition {
            let observed = highest_sequence(log.iter(), &condition.fail_if_events_match);
            if !condition.permits(observed) {
                warn!(
                    observed = observed,
                    expected = condition.after,
                    "append condition denied"
                );
                return Ok(AppendOutcome::Denied);
            }
        }

        let first = Self::next_sequence(&log);
        let recorded_at = Utc::now();
        for (offset, event) in events.into_iter().enumerate() {
            log.push(SequencedEvent {
                sequence: first + offset as i64,
                recorded_at,
                event,
            });
        }
        let last = log.last().map(|e| e.sequence).unwrap_or(first);

        debug!(first = first, last = last, "events appended");
        Ok(AppendOutcome::Appended(SequenceRange::new(first, last)))
    }
}

// =============================================================================
// Tests
// =============================================================================
