// ============================================================================
// Event Store Engine
// ============================================================================
//
// Persistence core of an event-sourced domain model:
// - append domain event batches, one envelope row per batch
// - write point-in-time aggregate snapshots with conflict detection
// - replay a bounded context's history page by page
// - load the latest snapshot of an aggregate
//
// Aggregates, message publishing and pool management live elsewhere.
//
// ============================================================================

pub mod config;
pub mod event_sourcing;
pub mod metrics;

pub use config::StoreConfig;
pub use event_sourcing::core::codec;
pub use event_sourcing::{
    AggregateRootState, ConnectionProvider, DeserializationError, DomainEvent, EventStore,
    EventStream, IsTransient, MemoryStore, Payload, PgConnectionProvider, Revision, SnapshotKey,
    StorageError, StoreConnection, StoreError, TableKind, TableName, TypeRouter,
};
pub use metrics::StoreMetrics;
