use uuid::Uuid;

use super::aggregate::SnapshotKey;

// ============================================================================
// Error Taxonomy
// ============================================================================
//
// - StorageError:         what a backend connection reports
// - DeserializationError: malformed or unrecognized envelope
// - StoreError:           what callers of the event store see
//
// "No snapshot found" is not an error; readers return `None`.
//
// ============================================================================

/// Failure reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The write hit a uniqueness constraint (snapshot primary key).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend is not reachable or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

/// Envelope could not be turned back into payloads.
#[derive(Debug, thiserror::Error)]
pub enum DeserializationError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("unexpected envelope schema id {found}")]
    SchemaMismatch { found: String },

    #[error("unsupported envelope format version {0}")]
    UnsupportedVersion(u32),

    #[error("unknown payload variant '{0}'")]
    UnknownVariant(String),

    #[error("payload '{type_tag}' could not be decoded: {source}")]
    Payload {
        type_tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("envelope declares '{declared}' but body decodes as '{decoded}'")]
    TagMismatch {
        declared: String,
        decoded: &'static str,
    },

    #[error("expected {expected} item(s) in envelope, found {found}")]
    ItemCount { expected: usize, found: usize },
}

/// Errors returned by [`crate::EventStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write to {table}: {source}")]
    PersistenceWrite {
        table: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to read from {table}: {source}")]
    PersistenceRead {
        table: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to open connection: {0}")]
    Connection(#[source] StorageError),

    /// Another writer already stored a snapshot for one of these keys.
    /// Reload the aggregate and decide whether to retry at a new version.
    #[error("snapshot concurrency conflict on {table} ({} snapshot(s) in batch)", .snapshots.len())]
    ConcurrencyConflict {
        table: String,
        snapshots: Vec<SnapshotKey>,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl StoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// True when the conflict batch contained a snapshot for `aggregate_id`.
    pub fn conflicts_with(&self, aggregate_id: Uuid) -> bool {
        match self {
            Self::ConcurrencyConflict { snapshots, .. } => {
                snapshots.iter().any(|key| key.aggregate_id == aggregate_id)
            }
            _ => false,
        }
    }
}

/// Check if an error is transient (worth retrying) or permanent.
///
/// The store never retries on its own; this only informs the caller.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

impl IsTransient for StorageError {
    fn is_transient(&self) -> bool {
        match self {
            Self::UniqueViolation(_) => false,
            Self::Unavailable(_) => true,
            Self::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
        }
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            Self::PersistenceWrite { source, .. }
            | Self::PersistenceRead { source, .. }
            | Self::Connection(source) => source.is_transient(),
            Self::InvalidArgument(_)
            | Self::Serialization(_)
            | Self::ConcurrencyConflict { .. }
            | Self::Deserialization(_)
            | Self::Metrics(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_reports_keys() {
        let aggregate_id = Uuid::new_v4();
        let err = StoreError::ConcurrencyConflict {
            table: "\"dbo\".\"OrdersSnapshots\"".to_string(),
            snapshots: vec![SnapshotKey { aggregate_id, version: 3 }],
            source: StorageError::UniqueViolation("duplicate key".to_string()),
        };

        assert!(err.is_concurrency_conflict());
        assert!(err.conflicts_with(aggregate_id));
        assert!(!err.conflicts_with(Uuid::new_v4()));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("1 snapshot(s)"));
    }

    #[test]
    fn test_transient_classification() {
        let unavailable = StoreError::PersistenceWrite {
            table: "t".to_string(),
            source: StorageError::Unavailable("connection reset".to_string()),
        };
        assert!(unavailable.is_transient());

        let pool_timeout = StoreError::Connection(StorageError::Database(sqlx::Error::PoolTimedOut));
        assert!(pool_timeout.is_transient());

        let corrupt = StoreError::Deserialization(DeserializationError::UnknownVariant("X".into()));
        assert!(!corrupt.is_transient());

        let bad_input = StoreError::InvalidArgument("mixed batch".to_string());
        assert!(!bad_input.is_transient());
    }
}
