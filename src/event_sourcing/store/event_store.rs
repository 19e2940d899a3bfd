use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::event_sourcing::core::{
    codec, AggregateRootState, DomainEvent, SnapshotKey, StorageError, StoreError,
};
use crate::metrics::StoreMetrics;

use super::connection::{ConnectionProvider, NewEventBatchRow, NewSnapshotRow, Revision, StoreConnection};
use super::router::{TableKind, TypeRouter};
use super::stream::EventStream;

// ============================================================================
// Event Store - Append, Snapshot, Replay
// ============================================================================
//
// Works with ANY event / state type that implements the payload contracts.
//
// Responsibilities:
// 1. Append an event batch as ONE envelope row (append-only)
// 2. Bulk-write snapshots, surfacing uniqueness violations as conflicts
// 3. Replay a bounded context's log from the start, page by page
// 4. Load the latest snapshot of an aggregate
//
// Writes take a connection from the caller (see `open_connection`); reads
// open their own. No retries happen here.
//
// ============================================================================

pub struct EventStore<P: ConnectionProvider> {
    provider: P,
    router: TypeRouter,
    config: StoreConfig,
    metrics: Arc<StoreMetrics>,
}

impl<P: ConnectionProvider> EventStore<P> {
    pub fn new(provider: P, config: StoreConfig) -> Result<Self, StoreError> {
        let metrics = StoreMetrics::new()?;
        Self::with_metrics(provider, config, Arc::new(metrics))
    }

    /// Build a store that reports into caller-owned metrics.
    pub fn with_metrics(
        provider: P,
        config: StoreConfig,
        metrics: Arc<StoreMetrics>,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        let router = TypeRouter::new(&config.schema)?;

        Ok(Self {
            provider,
            router,
            config,
            metrics,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    pub fn router(&self) -> &TypeRouter {
        &self.router
    }

    pub async fn open_connection(&self) -> Result<P::Connection, StoreError> {
        self.provider.open().await.map_err(StoreError::Connection)
    }

    /// Release a connection obtained from [`EventStore::open_connection`].
    /// Dropping it is the release: a pooled connection goes back to its pool.
    pub fn close_connection(&self, connection: P::Connection) {
        drop(connection);
        tracing::trace!("Connection released");
    }

    /// Append `events` as one batch row.
    ///
    /// Returns the revision the store assigned, or `None` for an empty
    /// slice (nothing is written). All events must belong to the same
    /// bounded context.
    pub async fn persist<E: DomainEvent>(
        &self,
        events: &[E],
        connection: &mut P::Connection,
    ) -> Result<Option<Revision>, StoreError> {
        if events.is_empty() {
            return Ok(None);
        }

        let events_count = i32::try_from(events.len()).map_err(|_| {
            StoreError::InvalidArgument(format!("batch of {} events is too large", events.len()))
        })?;

        let route = self.router.resolve_batch(events, TableKind::Events)?;
        let row = NewEventBatchRow {
            events: codec::serialize(events)?,
            events_count,
            timestamp: Utc::now(),
        };

        let started = Instant::now();
        let result = connection.append_event_batch(&route.table, row).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(revision) => {
                self.metrics
                    .record_append(&route.bounded_context, events.len(), elapsed, true);

                tracing::info!(
                    bounded_context = %route.bounded_context,
                    table = %route.table,
                    revision = revision,
                    event_count = events.len(),
                    "✅ Appended event batch"
                );

                Ok(Some(revision))
            }
            Err(source) => {
                self.metrics
                    .record_append(&route.bounded_context, events.len(), elapsed, false);

                tracing::error!(
                    bounded_context = %route.bounded_context,
                    table = %route.table,
                    event_count = events.len(),
                    error = %source,
                    "Failed to append event batch"
                );

                Err(StoreError::PersistenceWrite {
                    table: route.table.to_string(),
                    source,
                })
            }
        }
    }

    /// Bulk-write snapshots in one call.
    ///
    /// A snapshot that already exists at the same (version, aggregate id)
    /// fails the whole write with [`StoreError::ConcurrencyConflict`].
    pub async fn take_snapshot<S: AggregateRootState>(
        &self,
        states: &[S],
        connection: &mut P::Connection,
    ) -> Result<(), StoreError> {
        if states.is_empty() {
            return Ok(());
        }

        let route = self.router.resolve_batch(states, TableKind::Snapshots)?;

        let timestamp = Utc::now();
        let rows = states
            .iter()
            .map(|state| {
                Ok(NewSnapshotRow {
                    version: state.version(),
                    aggregate_id: state.aggregate_id(),
                    aggregate_state: codec::serialize_one(state)?,
                    timestamp,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let started = Instant::now();
        let result = connection.append_snapshots(&route.table, rows).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                self.metrics
                    .record_snapshot_write(&route.bounded_context, states.len(), elapsed, false);

                tracing::info!(
                    bounded_context = %route.bounded_context,
                    table = %route.table,
                    snapshot_count = states.len(),
                    "📸 Snapshots written"
                );

                Ok(())
            }
            Err(source @ StorageError::UniqueViolation(_)) => {
                self.metrics
                    .record_snapshot_write(&route.bounded_context, states.len(), elapsed, true);

                let snapshots: Vec<SnapshotKey> = states.iter().map(SnapshotKey::of).collect();

                tracing::warn!(
                    bounded_context = %route.bounded_context,
                    table = %route.table,
                    snapshot_count = snapshots.len(),
                    first = %snapshots[0],
                    error = %source,
                    "Snapshot concurrency conflict"
                );

                Err(StoreError::ConcurrencyConflict {
                    table: route.table.to_string(),
                    snapshots,
                    source,
                })
            }
            Err(source) => {
                self.metrics
                    .record_snapshot_write_failure(&route.bounded_context, elapsed);

                tracing::error!(
                    bounded_context = %route.bounded_context,
                    table = %route.table,
                    error = %source,
                    "Failed to write snapshots"
                );

                Err(StoreError::PersistenceWrite {
                    table: route.table.to_string(),
                    source,
                })
            }
        }
    }

    /// Highest-version snapshot of `aggregate_id`, or `None` if there is
    /// none yet.
    pub async fn load_latest_snapshot<S: AggregateRootState>(
        &self,
        bounded_context: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<S>, StoreError> {
        let table = self.router.table_for(bounded_context, TableKind::Snapshots)?;
        let mut connection = self.open_connection().await?;

        let payload = connection
            .fetch_latest_snapshot(&table, aggregate_id)
            .await
            .map_err(|source| StoreError::PersistenceRead {
                table: table.to_string(),
                source,
            })?;
        self.close_connection(connection);

        self.metrics
            .record_snapshot_load(bounded_context, payload.is_some());

        let Some(bytes) = payload else {
            tracing::debug!(
                bounded_context = bounded_context,
                aggregate_id = %aggregate_id,
                "No snapshot found"
            );
            return Ok(None);
        };

        let state: S = codec::deserialize_one(&bytes)?;

        tracing::debug!(
            bounded_context = bounded_context,
            aggregate_id = %aggregate_id,
            version = state.version(),
            "Loaded latest snapshot"
        );

        Ok(Some(state))
    }

    /// Replay a bounded context from its first batch, `batch_size` rows per
    /// query. The stream owns its own connection.
    pub async fn stream_from_start<E: DomainEvent>(
        &self,
        bounded_context: &str,
        batch_size: usize,
    ) -> Result<EventStream<P::Connection, E>, StoreError> {
        if batch_size == 0 {
            return Err(StoreError::InvalidArgument(
                "stream batch size must be at least 1".to_string(),
            ));
        }

        let table = self.router.table_for(bounded_context, TableKind::Events)?;
        let connection = self.open_connection().await?;

        tracing::debug!(
            bounded_context = bounded_context,
            table = %table,
            batch_size = batch_size,
            "Opening event stream"
        );

        Ok(EventStream::new(
            connection,
            table,
            bounded_context,
            batch_size,
            self.metrics.clone(),
        ))
    }

    /// [`EventStore::stream_from_start`] with the configured page size.
    pub async fn stream_from_start_default<E: DomainEvent>(
        &self,
        bounded_context: &str,
    ) -> Result<EventStream<P::Connection, E>, StoreError> {
        self.stream_from_start(bounded_context, self.config.default_stream_batch_size)
            .await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
