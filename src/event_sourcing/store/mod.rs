// ============================================================================
// Event Sourcing Store - Persistence Layer
// ============================================================================
//
// - router:      payload type -> bounded context -> table
// - connection:  the storage seam (connection + provider traits, row shapes)
// - postgres:    sqlx backend
// - memory:      in-process backend with the same table semantics
// - stream:      paginated replay cursor
// - event_store: the engine tying it together
//
// ============================================================================

pub mod connection;
pub mod event_store;
pub mod memory;
pub mod postgres;
pub mod router;
pub mod stream;

pub use connection::{
    ConnectionProvider, NewEventBatchRow, NewSnapshotRow, Revision, StoreConnection,
    StoredEventBatch,
};
pub use event_store::EventStore;
pub use memory::{MemoryConnection, MemoryEventRow, MemoryStore};
pub use postgres::{PgConnectionProvider, PgStoreConnection};
pub use router::{Route, TableKind, TableName, TypeRouter};
pub use stream::EventStream;
