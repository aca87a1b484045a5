//! Storage layer for the DCB event store.
//!
//! Provides the backend port, two interchangeable backends, and the public
//! facade:
//!
//! - **[`EventLog`] trait**: the narrow backend interface (port)
//! - **[`MemoryStore`]**: single-writer serialization behind one lock;
//!   fast, for tests and embedded use
//! - **`PgEventStore`**: PostgreSQL implementation (feature `postgres`)
//!   with serializable-isolation or advisory-lock write strategies
//! - **[`EventStore`]**: the `read`/`append` facade with validation and
//!   tracing
//!
//! # Usage
//!
//! ```rust
//! use dcb_core::{AppendCondition, Event, Query};
//! use dcb_store::{EventStore, MemoryStore, ReadOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = EventStore::new(MemoryStore::new());
//!
//!     let query = Query::new()
//!         .with_type("CourseDefined")
//!         .with_tag("courseId", "c1");
//!
//!     // Read, build a decision model, append against the observed head.
//!     let observed = store.highest_sequence(&query).await.unwrap();
//!     let outcome = store
//!         .append(
//!             vec![Event::new("CourseDefined").with_tag("courseId", "c1")],
//!             Some(&AppendCondition::new(query).with_after(observed)),
//!         )
//!         .await
//!         .unwrap();
//!     assert!(outcome.is_appended());
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod backend;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod store;

// Re-exports
pub use backend::{EventLog, ReadOptions};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::{init_schema, PgEventStore, WriteStrategy};
pub use store::EventStore;
