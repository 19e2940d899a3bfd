use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event_sourcing::core::StorageError;

use super::router::TableName;

// ============================================================================
// Storage Seam - Connections and Row Shapes
// ============================================================================
//
// The engine talks to storage through four primitives only. Each write is
// a single bulk-append call, which is the unit of atomicity; nothing holds
// a lock across calls.
//
// Event table:     Revision | Events | EventsCount | Timestamp
// Snapshot table:  Version | AggregateId | AggregateState | Timestamp
//                  primary key (Version, AggregateId)
//
// ============================================================================

/// Store-assigned identifier of an appended event batch.
pub type Revision = i64;

/// Event batch row as handed to the backend. `Revision` is assigned by
/// the backend.
#[derive(Debug, Clone)]
pub struct NewEventBatchRow {
    pub events: Vec<u8>,
    pub events_count: i32,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot row as handed to the backend.
#[derive(Debug, Clone)]
pub struct NewSnapshotRow {
    pub version: i32,
    pub aggregate_id: Uuid,
    pub aggregate_state: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Event batch row read back during replay.
#[derive(Debug, Clone)]
pub struct StoredEventBatch {
    pub revision: Revision,
    pub events: Vec<u8>,
}

/// An open session against the store.
#[async_trait]
pub trait StoreConnection: Send {
    /// Append one event batch row; returns the revision it was given.
    async fn append_event_batch(
        &mut self,
        table: &TableName,
        row: NewEventBatchRow,
    ) -> Result<Revision, StorageError>;

    /// Append all rows in one write. Either every row lands or none does;
    /// a duplicate (version, aggregate id) fails with
    /// [`StorageError::UniqueViolation`].
    async fn append_snapshots(
        &mut self,
        table: &TableName,
        rows: Vec<NewSnapshotRow>,
    ) -> Result<(), StorageError>;

    /// Up to `limit` batches ordered by revision ascending, skipping `offset`.
    async fn fetch_event_page(
        &mut self,
        table: &TableName,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredEventBatch>, StorageError>;

    /// Payload of the highest-version snapshot of `aggregate_id`.
    async fn fetch_latest_snapshot(
        &mut self,
        table: &TableName,
        aggregate_id: Uuid,
    ) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Hands out connections. Pooling, retries and timeouts are the
/// provider's business.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: StoreConnection + 'static;

    async fn open(&self) -> Result<Self::Connection, StorageError>;
}
