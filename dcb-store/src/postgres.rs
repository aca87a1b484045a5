//! PostgreSQL event log
//!
//! One append-only `dcb_events` table keyed by `sequence`, with a btree
//! index on `event_type` and a GIN index on the `tags` JSONB column. Tag
//! predicates compile to JSONB containment (`tags @> ...`), which gives
//! exact per-key equality with AND semantics.
//!
//! The same predicate builder renders the WHERE clause for plain reads and
//! for the write-time condition check, so the conflict scope is always the
//! exact query the client read with.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::backend::{EventLog, ReadOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dcb_core::{
    AppendCondition, AppendOutcome, Event, EventStoreError, Query, Result, SequenceRange,
    SequencedEvent, Tags,
};
use sqlx::postgres::PgPool;
use tracing::{debug, warn};

/// Key for the advisory lock used by [`WriteStrategy::GlobalWriterLock`].
const WRITER_LOCK_KEY: i64 = 0x_dcb_0001;

/// How the backend makes the condition check and the insert atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// Serializable-isolation transactions: multiple writers, the database
    /// detects read/write-set overlap and aborts one side with a
    /// serialization failure, surfaced as
    /// [`EventStoreError::TransientConflict`].
    ///
    /// Sequence allocation reads the log head, which puts the head in
    /// every append's read set: any two concurrent appends conflict, even
    /// with disjoint or absent conditions, and the loser must retry.
    /// [`WriteStrategy::GlobalWriterLock`] avoids the aborts by
    /// serializing writers instead.
    #[default]
    Serializable,

    /// A transaction-scoped advisory lock serializes all writers (one at a
    /// time). No serialization aborts; conflicting conditions surface as
    /// [`AppendOutcome::Denied`] only. Readers are unaffected.
    GlobalWriterLock,
}

/// PostgreSQL-backed event log.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    strategy: WriteStrategy,
}

impl PgEventStore {
    /// Wrap a pool using the default serializable-transaction strategy.
    pub fn new(pool: PgPool) -> Self {
        Self::with_strategy(pool, WriteStrategy::default())
    }

    /// Wrap a pool with an explicit write strategy.
    pub fn with_strategy(pool: PgPool, strategy: WriteStrategy) -> Self {
        Self { pool, strategy }
    }

    /// Get a reference to the underlying pool (for testing).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create the `dcb_events` table and its indexes if they don't exist.
///
/// Idempotent; safe to run at every startup.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await.map_err(from_sqlx)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dcb_events (
            sequence    BIGINT PRIMARY KEY,
            event_type  TEXT NOT NULL,
            tags        JSONB NOT NULL DEFAULT '{}'::jsonb,
            data        BYTEA NOT NULL DEFAULT ''::bytea,
            metadata    BYTEA,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(from_sqlx)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS dcb_events_type_idx ON dcb_events (event_type)")
        .execute(&mut *tx)
        .await
        .map_err(from_sqlx)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS dcb_events_tags_idx ON dcb_events USING GIN (tags)")
        .execute(&mut *tx)
        .await
        .map_err(from_sqlx)?;

    tx.commit().await.map_err(from_sqlx)?;

    debug!("event store schema initialized");
    Ok(())
}

/// Append the query's predicate to a WHERE clause under construction.
///
/// Placeholders are pushed in a fixed order (types, then tags); callers
/// bind values in the same order.
fn push_predicate(sql: &mut String, bind_count: &mut usize, query: &Query) {
    if !query.types.is_empty() {
        *bind_count += 1;
        sql.push_str(&format!(" AND event_type = ANY(${})", bind_count));
    }
    if !query.tags.is_empty() {
        *bind_count += 1;
        sql.push_str(&format!(" AND tags @> ${}", bind_count));
    }
}

fn predicate_types(query: &Query) -> Vec<String> {
    query.types.iter().cloned().collect()
}

fn predicate_tags(query: &Query) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(&query.tags)?)
}

/// Highest matching sequence, evaluated on any executor so the identical
/// computation runs both as a standalone read and inside the append's
/// transaction.
async fn query_head<'e, E>(executor: E, query: &Query) -> Result<i64>
where
    E: sqlx::PgExecutor<'e>,
{
    let mut sql =
        String::from("SELECT COALESCE(MAX(sequence), 0) FROM dcb_events WHERE TRUE");
    let mut bind_count = 0;
    push_predicate(&mut sql, &mut bind_count, query);

    let mut q = sqlx::query_scalar::<_, i64>(&sql);
    if !query.types.is_empty() {
        q = q.bind(predicate_types(query));
    }
    if !query.tags.is_empty() {
        q = q.bind(predicate_tags(query)?);
    }
    q.fetch_one(executor).await.map_err(from_sqlx)
}

/// Database row mapping
#[derive(sqlx::FromRow)]
struct EventRow {
    sequence: i64,
    event_type: String,
    tags: serde_json::Value,
    data: Vec<u8>,
    metadata: Option<Vec<u8>>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for SequencedEvent {
    type Error = EventStoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        let tags: Tags = serde_json::from_value(row.tags)?;
        Ok(SequencedEvent {
            sequence: row.sequence,
            recorded_at: row.recorded_at,
            event: Event {
                event_type: row.event_type,
                tags,
                data: row.data,
                metadata: row.metadata,
            },
        })
    }
}

#[async_trait]
impl EventLog for PgEventStore {
    async fn read(&self, query: &Query, options: ReadOptions) -> Result<Vec<SequencedEvent>> {
        let mut sql = String::from(
            "SELECT sequence, event_type, tags, data, metadata, recorded_at \
             FROM dcb_events WHERE sequence > $1",
        );
        let mut bind_count = 1;
        push_predicate(&mut sql, &mut bind_count, query);
        sql.push_str(" ORDER BY sequence ASC");
        if options.limit.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" LIMIT ${}", bind_count));
        }

        let mut q = sqlx::query_as::<_, EventRow>(&sql).bind(options.from_sequence);
        if !query.types.is_empty() {
            q = q.bind(predicate_types(query));
        }
        if !query.tags.is_empty() {
            q = q.bind(predicate_tags(query)?);
        }
        if let Some(limit) = options.limit {
            q = q.bind(limit.max(0));
        }

        let rows = q.fetch_all(&self.pool).await.map_err(from_sqlx)?;
        rows.into_iter().map(SequencedEvent::try_from).collect()
    }

    async fn highest_sequence(&self, query: &Query) -> Result<i64> {
        query_head(&self.pool, query).await
    }

    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<&AppendCondition>,
    ) -> Result<AppendOutcome> {
        let mut tx = self.pool.begin().await.map_err(from_sqlx)?;

        match self.strategy {
            WriteStrategy::Serializable => {
                sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                    .execute(&mut *tx)
                    .await
                    .map_err(from_sqlx)?;
            }
            WriteStrategy::GlobalWriterLock => {
                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(WRITER_LOCK_KEY)
                    .execute(&mut *tx)
                    .await
                    .map_err(from_sqlx)?;
            }
        }

        // Re-run the client's query inside the same transaction as the
        // insert and compare watermarks.
        if let Some(condition) = condition {
            let observed = query_head(&mut *tx, &condition.fail_if_events_match).await?;
            if !condition.permits(observed) {
                tx.rollback().await.map_err(from_sqlx)?;
                warn!(
                    observed = observed,
                    expected = condition.after,
                    "append condition denied"
                );
                return Ok(AppendOutcome::Denied);
            }
        }

        // Allocate from the log head so one batch is always contiguous.
        let head: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(sequence), 0) FROM dcb_events")
                .fetch_one(&mut *tx)
                .await
                .map_err(from_sqlx)?;
        let first = head + 1;
        let last = head + events.len() as i64;

        for (offset, event) in events.iter().enumerate() {
            insert_event(&mut tx, first + offset as i64, event).await?;
        }

        tx.commit().await.map_err(from_sqlx)?;

        debug!(first = first, last = last, "events appended");
        Ok(AppendOutcome::Appended(SequenceRange::new(first, last)))
    }
}

async fn insert_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    sequence: i64,
    event: &Event,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO dcb_events (sequence, event_type, tags, data, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(sequence)
    .bind(&event.event_type)
    .bind(serde_json::to_value(&event.tags)?)
    .bind(&event.data)
    .bind(event.metadata.as_deref())
    .execute(&mut **tx)
    .await
    .map_err(from_sqlx)?;
    Ok(())
}

/// Map sqlx errors onto the store taxonomy.
///
/// SQLSTATE 40001 (serialization_failure) and 40P01 (deadlock_detected)
/// are the backend's concurrency control speaking: retryable, not fatal.
fn from_sqlx(err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("40001") | Some("40P01") => EventStoreError::TransientConflict,
            _ => EventStoreError::Database(db_err.to_string()),
        },
        sqlx::Error::Io(io_err) => EventStoreError::Connection(io_err.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            EventStoreError::Connection(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            EventStoreError::Serialization(err.to_string())
        }
        other => EventStoreError::Database(other.to_string()),
    }
}

// =============================================================================
// Integration tests (require DATABASE_URL, run with --ignored)
// =============================================================================
