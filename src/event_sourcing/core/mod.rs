// ============================================================================
// Event Sourcing Core - Payload Contracts, Codec, Errors
// ============================================================================
//
// Nothing in here touches storage:
// - Payload / DomainEvent / AggregateRootState: what callers hand the store
// - codec: the binary envelope shared by event batches and snapshots
// - error: the error taxonomy used throughout the crate
//
// ============================================================================

pub mod aggregate;
pub mod codec;
pub mod error;
pub mod event;

pub use aggregate::{AggregateRootState, SnapshotKey};
pub use error::{DeserializationError, IsTransient, StorageError, StoreError};
pub use event::{DomainEvent, Payload};
