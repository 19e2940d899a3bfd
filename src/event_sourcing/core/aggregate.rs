use uuid::Uuid;

use super::event::Payload;

// ============================================================================
// Aggregate Root State - Snapshot Payload
// ============================================================================
//
// The aggregate itself (uncommitted events, apply/rebuild) lives outside
// this crate. The store only sees the state object a snapshot policy hands
// over, identified by (version, aggregate id).
//
// ============================================================================

/// Point-in-time state of an aggregate, persisted as a snapshot.
pub trait AggregateRootState: Payload {
    /// Globally unique aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Version assigned by the aggregate. The store never generates it;
    /// (version, aggregate id) is unique per snapshot table.
    fn version(&self) -> i32;
}

/// Primary key of a snapshot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub aggregate_id: Uuid,
    pub version: i32,
}

impl SnapshotKey {
    pub fn of<S: AggregateRootState>(state: &S) -> Self {
        Self {
            aggregate_id: state.aggregate_id(),
            version: state.version(),
        }
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.aggregate_id, self.version)
    }
}
