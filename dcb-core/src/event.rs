//! Event types

use crate::error::{EventStoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag set attached to an event: key-value string pairs naming the
/// entities the event affects (e.g. `{courseId: "c1"}`). Keys are unique
/// within one event.
pub type Tags = BTreeMap<String, String>;

/// A new event as supplied by the caller, before a sequence position has
/// been assigned.
///
/// `data` and `metadata` are opaque to the store; it never inspects or
/// filters on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind, e.g. "CourseDefined". Must be non-empty.
    pub event_type: String,

    /// Entity tags used for query filtering.
    #[serde(default)]
    pub tags: Tags,

    /// Opaque payload.
    #[serde(default)]
    pub data: Vec<u8>,

    /// Opaque technical context (trace ids, causation, schema hints).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<u8>>,
}

impl Event {
    /// Create a new event of the given type with no tags and no payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            tags: Tags::new(),
            data: Vec::new(),
            metadata: None,
        }
    }

    /// Attach a tag. Re-using a key overwrites the previous value.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the opaque payload.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Set opaque metadata.
    pub fn with_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Validate a single event before it touches any backend.
    pub fn validate(&self) -> Result<()> {
        if self.event_type.is_empty() {
            return Err(EventStoreError::EmptyEventType);
        }
        if self.tags.keys().any(|k| k.is_empty()) {
            return Err(EventStoreError::EmptyTagKey);
        }
        Ok(())
    }
}

/// An event as persisted: immutable, stamped with its global sequence
/// position and the time the store recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// Store-assigned position in the global log. Strictly increasing,
    /// unique, never reused; gaps between batches are allowed.
    pub sequence: i64,

    /// When the store recorded the event.
    pub recorded_at: DateTime<Utc>,

    /// The event as supplied at append time.
    #[serde(flatten)]
    pub event: Event,
}

/// Validate an append batch: non-empty, every event well-formed.
///
/// Runs before any backend interaction so a bad batch is never partially
/// applied.
pub fn validate_batch(events: &[Event]) -> Result<()> {
    if events.is_empty() {
        return Err(EventStoreError::EmptyBatch);
    }
    for event in events {
        event.validate()?;
    }
    Ok(())
}
