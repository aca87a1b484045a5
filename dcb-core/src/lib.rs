//! Core vocabulary for the DCB event store.
//!
//! An append-only event log where write-time consistency is scoped by a
//! query instead of a fixed stream identity (a *dynamic consistency
//! boundary*). This crate holds the pure model:
//!
//! - [`Event`] / [`SequencedEvent`]: the client-supplied record and its
//!   persisted, sequence-stamped form
//! - [`Query`]: a type/tag predicate, usable both as a read filter and as
//!   the scope of a write-time conflict check
//! - [`AppendCondition`]: a query plus the sequence watermark observed at
//!   read time
//! - [`AppendOutcome`]: append result where losing the race is a value,
//!   not an error
//!
//! No I/O lives here; backends are in `dcb-store`.
//!
//! # Usage
//!
//! ```rust
//! use dcb_core::{AppendCondition, Event, Query};
//!
//! let event = Event::new("CourseDefined")
//!     .with_tag("courseId", "c1")
//!     .with_data(br#"{"capacity":10}"#.to_vec());
//!
//! let query = Query::new()
//!     .with_type("CourseDefined")
//!     .with_tag("courseId", "c1");
//! assert!(query.matches(&event));
//!
//! // Creation guard: fail if any CourseDefined for c1 already exists.
//! let condition = AppendCondition::new(query);
//! assert_eq!(condition.after, 0);
//! ```

#![warn(clippy::all)]

mod condition;
mod error;
mod event;
mod query;

pub use condition::{AppendCondition, AppendOutcome, SequenceRange};
pub use error::{EventStoreError, Result};
pub use event::{validate_batch, Event, SequencedEvent, Tags};
pub use query::{highest_sequence, Query};
