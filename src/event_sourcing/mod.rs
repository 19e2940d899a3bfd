// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic persistence core: append event batches, write and load snapshots,
// replay a bounded context's log from the start.
//
// ============================================================================

pub mod core;
pub mod store;

pub use self::core::*;
pub use self::store::*;
