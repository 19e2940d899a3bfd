use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::event_sourcing::core::StorageError;

use super::connection::{
    ConnectionProvider, NewEventBatchRow, NewSnapshotRow, Revision, StoreConnection,
    StoredEventBatch,
};
use super::router::TableName;

// ============================================================================
// In-Memory Backend
// ============================================================================
//
// Mirrors the relational layout closely enough to exercise the engine:
// - revisions start at 1 per event table and only grow
// - snapshot tables are keyed by (version, aggregate id)
// - a snapshot bulk append is all-or-nothing
//
// Tables spring into existence on first write. Write failures can be
// injected to exercise error paths.
//
// ============================================================================

/// Event batch row as stored.
#[derive(Debug, Clone)]
pub struct MemoryEventRow {
    pub revision: Revision,
    pub events: Vec<u8>,
    pub events_count: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct EventTable {
    next_revision: Revision,
    rows: Vec<MemoryEventRow>,
}

#[derive(Default)]
struct Tables {
    events: HashMap<TableName, EventTable>,
    snapshots: HashMap<TableName, BTreeMap<(i32, Uuid), NewSnapshotRow>>,
    failing_writes: Option<String>,
}

/// Shared in-memory store; clones see the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with `message` until cleared.
    pub async fn fail_writes(&self, message: impl Into<String>) {
        self.tables.lock().await.failing_writes = Some(message.into());
    }

    pub async fn clear_write_failures(&self) {
        self.tables.lock().await.failing_writes = None;
    }

    /// Snapshot of an event table's rows, in revision order.
    pub async fn event_rows(&self, table: &TableName) -> Vec<MemoryEventRow> {
        self.tables
            .lock()
            .await
            .events
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub async fn snapshot_count(&self, table: &TableName) -> usize {
        self.tables
            .lock()
            .await
            .snapshots
            .get(table)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConnectionProvider for MemoryStore {
    type Connection = MemoryConnection;

    async fn open(&self) -> Result<Self::Connection, StorageError> {
        Ok(MemoryConnection {
            tables: self.tables.clone(),
        })
    }
}

pub struct MemoryConnection {
    tables: Arc<Mutex<Tables>>,
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn append_event_batch(
        &mut self,
        table: &TableName,
        row: NewEventBatchRow,
    ) -> Result<Revision, StorageError> {
        let mut tables = self.tables.lock().await;
        if let Some(message) = &tables.failing_writes {
            return Err(StorageError::Unavailable(message.clone()));
        }

        let event_table = tables.events.entry(table.clone()).or_default();
        event_table.next_revision += 1;
        let revision = event_table.next_revision;

        event_table.rows.push(MemoryEventRow {
            revision,
            events: row.events,
            events_count: row.events_count,
            timestamp: row.timestamp,
        });

        Ok(revision)
    }

    async fn append_snapshots(
        &mut self,
        table: &TableName,
        rows: Vec<NewSnapshotRow>,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;
        if let Some(message) = &tables.failing_writes {
            return Err(StorageError::Unavailable(message.clone()));
        }

        let snapshot_table = tables.snapshots.entry(table.clone()).or_default();

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            let key = (row.version, row.aggregate_id);
            if snapshot_table.contains_key(&key) || !seen.insert(key) {
                return Err(StorageError::UniqueViolation(format!(
                    "duplicate key (Version, AggregateId)=({}, {}) in {}",
                    row.version, row.aggregate_id, table
                )));
            }
        }

        for row in rows {
            snapshot_table.insert((row.version, row.aggregate_id), row);
        }

        Ok(())
    }

    async fn fetch_event_page(
        &mut self,
        table: &TableName,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredEventBatch>, StorageError> {
        let tables = self.tables.lock().await;
        let Some(event_table) = tables.events.get(table) else {
            return Ok(Vec::new());
        };

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(0);

        Ok(event_table
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|row| StoredEventBatch {
                revision: row.revision,
                events: row.events.clone(),
            })
            .collect())
    }

    async fn fetch_latest_snapshot(
        &mut self,
        table: &TableName,
        aggregate_id: Uuid,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let tables = self.tables.lock().await;

        Ok(tables.snapshots.get(table).and_then(|snapshots| {
            snapshots
                .values()
                .filter(|row| row.aggregate_id == aggregate_id)
                .max_by_key(|row| row.version)
                .map(|row| row.aggregate_state.clone())
        }))
    }
}
