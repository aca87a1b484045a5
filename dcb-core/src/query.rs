//! Query predicate over events
//!
//! The same [`Query`] value is used as a read filter and as the scope of a
//! write-time conflict check, so filter semantics live in exactly one
//! place.

use crate::event::{Event, SequencedEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A predicate selecting a subset of events by type and tags.
///
/// An event matches when:
/// - its type is in `types` (an empty set means any type), and
/// - for every entry in `tags`, the event carries that exact key-value
///   pair. A missing key never matches; there is no null-equals-empty.
///
/// A query with no types and no tags matches every event in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Accepted event types. Empty = any type.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub types: BTreeSet<String>,

    /// Required tags, AND-combined, exact match.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// The query that matches every event ever written. Useful as a guard
    /// on the head of the whole log.
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept an additional event type.
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.types.insert(event_type.into());
        self
    }

    /// Accept several event types at once.
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Require an exact tag match.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Whether the query matches the given event. Pure, no side effects.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.types.is_empty() && !self.types.contains(&event.event_type) {
            return false;
        }
        self.tags
            .iter()
            .all(|(key, value)| event.tags.get(key) == Some(value))
    }
}

/// Highest sequence position among events matching `query`, or 0 when no
/// event matches.
///
/// Non-decreasing as the log grows: re-evaluating the same query against a
/// strictly larger log never yields a smaller result. The Postgres backend
/// expresses the same computation as `MAX(sequence)` over the shared SQL
/// predicate.
pub fn highest_sequence<'a, I>(events: I, query: &Query) -> i64
where
    I: IntoIterator<Item = &'a SequencedEvent>,
{
    events
        .into_iter()
        .filter(|stored| query.matches(&stored.event))
        .map(|stored| stored.sequence)
        .max()
        .unwrap_or(0)
}
