//! Event store facade
//!
//! Composes validation, the query engine and a backend into the public
//! `read`/`append` surface. All input validation happens here, before any
//! backend I/O; the backend only ever sees well-formed batches.

use crate::backend::{EventLog, ReadOptions};
use dcb_core::{
    validate_batch, AppendCondition, AppendOutcome, Event, Query, Result, SequencedEvent,
};
use futures_util::stream::{self, Stream, TryStreamExt};
use tracing::debug;

/// Page size used by [`EventStore::stream`] when fetching lazily.
const STREAM_PAGE_SIZE: i64 = 256;

/// Public facade over an [`EventLog`] backend.
///
/// Cloning is as cheap as cloning the backend handle, so one store can be
/// shared across any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct EventStore<B> {
    backend: B,
}

impl<B: EventLog> EventStore<B> {
    /// Wrap a backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Access the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read events matching `query`, ascending by sequence.
    ///
    /// Never mutates state; safe to run concurrently with any number of
    /// other reads and writes.
    pub async fn read(&self, query: &Query, options: ReadOptions) -> Result<Vec<SequencedEvent>> {
        self.backend.read(query, options).await
    }

    /// Highest sequence position among events matching `query`, or 0.
    ///
    /// This is the watermark a client records before building its decision
    /// model and passes back as [`AppendCondition::after`].
    pub async fn highest_sequence(&self, query: &Query) -> Result<i64> {
        self.backend.highest_sequence(query).await
    }

    /// Lazy, forward-only stream of matching events.
    ///
    /// Fetches pages of [`STREAM_PAGE_SIZE`] by keyset pagination
    /// (`sequence > cursor`), so the caller may abandon the stream at any
    /// point without cost. The stream is not restartable mid-flight; a
    /// fresh call starts over and may observe newly appended events.
    pub fn stream<'a>(
        &'a self,
        query: &'a Query,
        options: ReadOptions,
    ) -> impl Stream<Item = Result<SequencedEvent>> + 'a {
        struct PageCursor {
            after: i64,
            remaining: Option<i64>,
            done: bool,
        }

        let state = PageCursor {
            after: options.from_sequence,
            remaining: options.limit,
            done: false,
        };

        stream::try_unfold(state, move |mut state| async move {
            if state.done || matches!(state.remaining, Some(r) if r <= 0) {
                return Ok::<_, dcb_core::EventStoreError>(None);
            }
            let page_limit = match state.remaining {
                Some(remaining) => remaining.min(STREAM_PAGE_SIZE),
                None => STREAM_PAGE_SIZE,
            };
            let page = self
                .backend
                .read(
                    query,
                    ReadOptions::new().from_sequence(state.after).limit(page_limit),
                )
                .await?;
            if page.is_empty() {
                return Ok(None);
            }
            if (page.len() as i64) < page_limit {
                state.done = true;
            }
            if let Some(last) = page.last() {
                state.after = last.sequence;
            }
            if let Some(remaining) = state.remaining.as_mut() {
                *remaining -= page.len() as i64;
            }
            let page = stream::iter(
                page.into_iter()
                    .map(Ok::<SequencedEvent, dcb_core::EventStoreError>),
            );
            Ok(Some((page, state)))
        })
        .try_flatten()
    }

    /// Append a batch of events, optionally guarded by a condition.
    ///
    /// All-or-nothing: either every event commits, occupying a contiguous
    /// run of sequence positions in input order, or nothing is written.
    /// A denied condition is reported as [`AppendOutcome::Denied`], not an
    /// error; the caller decides whether to re-read and retry.
    pub async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<&AppendCondition>,
    ) -> Result<AppendOutcome> {
        validate_batch(&events)?;

        let count = events.len();
        let outcome = self.backend.append(events, condition).await?;

        match &outcome {
            AppendOutcome::Appended(range) => {
                debug!(first = range.first, last = range.last, count, "batch appended");
            }
            AppendOutcome::Denied => {
                debug!(count, "append denied by condition");
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use dcb_core::EventStoreError;
    use futures_util::StreamExt;

    fn store() -> EventStore<MemoryStore> {
        EventStore::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_backend() {
        let store = store();
        let result = store.append(vec![], None).await;
        assert!(matches!(result, Err(EventStoreError::EmptyBatch)));
        assert_eq!(store.backend().event_count(), 0);
    }

    #[tokio::test]
    async fn invalid_event_rejects_whole_batch() {
        let store = store();
        let batch = vec![
            Event::new("CourseDefined").with_tag("courseId", "c1"),
            Event::new(""),
        ];
        let result = store.append(batch, None).await;
        assert!(matches!(result, Err(EventStoreError::EmptyEventType)));
        // Nothing was partially applied.
        assert_eq!(store.backend().event_count(), 0);
    }

    #[tokio::test]
    async fn round_trip_preserves_type_tags_and_data() {
        let store = store();
        let event = Event::new("CourseDefined")
            .with_tag("courseId", "c1")
            .with_data(br#"{"capacity":10}"#.to_vec());
        store.append(vec![event.clone()], None).await.unwrap();

        let query = Query::new()
            .with_type("CourseDefined")
            .with_tag("courseId", "c1");
        let events = store.read(&query, ReadOptions::new()).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, event);
        assert_eq!(events[0].sequence, 1);
    }

    #[tokio::test]
    async fn creation_guard_is_idempotent_on_empty_log_only() {
        let store = store();
        let query = Query::new()
            .with_type("UserCreated")
            .with_tag("userId", "123");
        let event = Event::new("UserCreated").with_tag("userId", "123");

        let outcome = store
            .append(vec![event.clone()], Some(&AppendCondition::new(query.clone())))
            .await
            .unwrap();
        assert!(outcome.is_appended());

        let outcome = store
            .append(vec![event], Some(&AppendCondition::new(query)))
            .await
            .unwrap();
        assert_eq!(outcome, AppendOutcome::Denied);
    }

    #[tokio::test]
    async fn stream_yields_events_in_order_and_respects_limit() {
        let store = store();
        for i in 1..=10 {
            store
                .append(
                    vec![Event::new("Ticked").with_tag("shard", "a").with_data(vec![i])],
                    None,
                )
                .await
                .unwrap();
        }

        let query = Query::new().with_tag("shard", "a");
        let events: Vec<_> = store
            .stream(&query, ReadOptions::new().from_sequence(2).limit(5))
            .collect()
            .await;

        let sequences: Vec<i64> = events
            .into_iter()
            .map(|item| item.unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn negative_limit_reads_nothing() {
        let store = store();
        store
            .append(vec![Event::new("Ticked").with_tag("shard", "a")], None)
            .await
            .unwrap();

        let query = Query::all();
        let events = store
            .read(&query, ReadOptions::new().limit(-3))
            .await
            .unwrap();
        assert!(events.is_empty());

        let streamed: Vec<_> = store
            .stream(&query, ReadOptions::new().limit(-3))
            .collect()
            .await;
        assert!(streamed.is_empty());
    }

    #[tokio::test]
    async fn stream_can_be_abandoned_mid_flight() {
        let store = store();
        for _ in 0..4 {
            store
                .append(vec![Event::new("Ticked").with_tag("shard", "a")], None)
                .await
                .unwrap();
        }

        let query = Query::all();
        let first_two: Vec<_> = store
            .stream(&query, ReadOptions::new())
            .take(2)
            .collect()
            .await;
        assert_eq!(first_two.len(), 2);

        // Abandoning the stream had no effect on stored state.
        assert_eq!(store.backend().event_count(), 4);
    }
}
