use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::event_sourcing::core::StorageError;

use super::connection::{
    ConnectionProvider, NewEventBatchRow, NewSnapshotRow, Revision, StoreConnection,
    StoredEventBatch,
};
use super::router::TableName;

// ============================================================================
// PostgreSQL Backend (sqlx)
// ============================================================================
//
// Expected layout per bounded context (identifiers are case-sensitive):
//
//   CREATE TABLE "dbo"."OrdersEvents" (
//       "Revision"    BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
//       "Events"      BYTEA       NOT NULL,
//       "EventsCount" INTEGER     NOT NULL,
//       "Timestamp"   TIMESTAMPTZ NOT NULL
//   );
//
//   CREATE TABLE "dbo"."OrdersSnapshots" (
//       "Version"        INTEGER     NOT NULL,
//       "AggregateId"    UUID        NOT NULL,
//       "AggregateState" BYTEA       NOT NULL,
//       "Timestamp"      TIMESTAMPTZ NOT NULL,
//       PRIMARY KEY ("Version", "AggregateId")
//   );
//
// Queries are built at runtime (no compile-time checking) because table
// names depend on the bounded context. Table names are validated by the
// router; every value is a bind parameter.
//
// ============================================================================

/// Hands out pooled connections from a [`PgPool`].
#[derive(Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
}

impl PgConnectionProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    type Connection = PgStoreConnection;

    async fn open(&self) -> Result<Self::Connection, StorageError> {
        let conn = self.pool.acquire().await?;
        Ok(PgStoreConnection { conn })
    }
}

/// A pooled connection. Dropping it returns it to the pool.
pub struct PgStoreConnection {
    conn: PoolConnection<Postgres>,
}

impl PgStoreConnection {
    pub fn from_pooled(conn: PoolConnection<Postgres>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StoreConnection for PgStoreConnection {
    async fn append_event_batch(
        &mut self,
        table: &TableName,
        row: NewEventBatchRow,
    ) -> Result<Revision, StorageError> {
        let sql = format!(
            r#"INSERT INTO {table} ("Events", "EventsCount", "Timestamp") VALUES ($1, $2, $3) RETURNING "Revision""#
        );

        let inserted = sqlx::query(&sql)
            .bind(row.events)
            .bind(row.events_count)
            .bind(row.timestamp)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(classify)?;

        Ok(inserted.try_get::<i64, _>("Revision")?)
    }

    async fn append_snapshots(
        &mut self,
        table: &TableName,
        rows: Vec<NewSnapshotRow>,
    ) -> Result<(), StorageError> {
        // One array bind per column: the bind count stays at 4 whatever the
        // batch size (the wire protocol caps a statement at 65535).
        let sql = format!(
            r#"INSERT INTO {table} ("Version", "AggregateId", "AggregateState", "Timestamp")
               SELECT * FROM UNNEST($1::INT4[], $2::UUID[], $3::BYTEA[], $4::TIMESTAMPTZ[])"#
        );

        let mut versions = Vec::with_capacity(rows.len());
        let mut aggregate_ids = Vec::with_capacity(rows.len());
        let mut states = Vec::with_capacity(rows.len());
        let mut timestamps = Vec::with_capacity(rows.len());
        for row in rows {
            versions.push(row.version);
            aggregate_ids.push(row.aggregate_id);
            states.push(row.aggregate_state);
            timestamps.push(row.timestamp);
        }

        sqlx::query(&sql)
            .bind(versions)
            .bind(aggregate_ids)
            .bind(states)
            .bind(timestamps)
            .execute(&mut *self.conn)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn fetch_event_page(
        &mut self,
        table: &TableName,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredEventBatch>, StorageError> {
        let sql = format!(
            r#"SELECT "Revision", "Events" FROM {table} ORDER BY "Revision" LIMIT $1 OFFSET $2"#
        );

        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *self.conn)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StoredEventBatch {
                    revision: row.try_get("Revision")?,
                    events: row.try_get("Events")?,
                })
            })
            .collect()
    }

    async fn fetch_latest_snapshot(
        &mut self,
        table: &TableName,
        aggregate_id: Uuid,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let sql = format!(
            r#"SELECT "AggregateState" FROM {table} WHERE "AggregateId" = $1 ORDER BY "Version" DESC LIMIT 1"#
        );

        let row = sqlx::query(&sql)
            .bind(aggregate_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("AggregateState")?)),
            None => Ok(None),
        }
    }
}

/// Map a unique-key violation to its own variant so the snapshot writer
/// can tell conflicts apart from other failures.
fn classify(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::UniqueViolation(db_err.message().to_string());
        }
    }
    StorageError::Database(err)
}
