//! Append conditions and append outcomes

use crate::query::Query;
use serde::{Deserialize, Serialize};

/// The consistency guard attached to an append.
///
/// Semantics: the append must fail if, at evaluation time, any event
/// matching `fail_if_events_match` exists with `sequence > after`. The
/// check runs inside the same atomic unit as the insert, against the
/// identical predicate the client used for its read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendCondition {
    /// Scope of the conflict check.
    pub fail_if_events_match: Query,

    /// Sequence watermark observed by the client at read time. Default 0,
    /// which turns the condition into a creation guard ("fail if any
    /// matching event already exists").
    #[serde(default)]
    pub after: i64,
}

impl AppendCondition {
    /// Condition with the default watermark of 0.
    pub fn new(fail_if_events_match: Query) -> Self {
        Self {
            fail_if_events_match,
            after: 0,
        }
    }

    /// Set the observed watermark.
    pub fn with_after(mut self, after: i64) -> Self {
        self.after = after;
        self
    }

    /// Whether an append is permitted given the watermark re-observed
    /// inside the write's atomic unit.
    ///
    /// Exact equality: sequence positions only grow, so any qualifying
    /// event appended after the client's read makes `observed` strictly
    /// larger than `after` and the append is denied.
    pub fn permits(&self, observed: i64) -> bool {
        observed == self.after
    }
}

/// Contiguous run of sequence positions assigned to one batch, in input
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRange {
    pub first: i64,
    pub last: i64,
}

impl SequenceRange {
    pub fn new(first: i64, last: i64) -> Self {
        Self { first, last }
    }

    /// Number of events in the range.
    pub fn len(&self) -> i64 {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

/// Result of an append.
///
/// A denied condition is an expected, first-class outcome under normal
/// concurrent load, so it is a variant here rather than an error. The
/// documented remediation is: re-read, rebuild the decision model, retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppendOutcome {
    /// The batch committed; all events occupy this contiguous range.
    Appended(SequenceRange),

    /// The append condition was not satisfied; zero rows were written.
    Denied,
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, AppendOutcome::Appended(_))
    }

    /// The assigned range, if the batch committed.
    pub fn range(&self) -> Option<SequenceRange> {
        match self {
            AppendOutcome::Appended(range) => Some(*range),
            AppendOutcome::Denied => None,
        }
    }
}
