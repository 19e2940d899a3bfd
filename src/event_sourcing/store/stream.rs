use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::stream::{self, Stream};

use crate::event_sourcing::core::{codec, DomainEvent, StoreError};
use crate::metrics::StoreMetrics;

use super::connection::StoreConnection;
use super::router::TableName;

// ============================================================================
// Stream Reader - Paginated Replay From the Start of a Bounded Context
// ============================================================================
//
// Cursor state: (table, batch size, next page index, open connection).
// Each page is one query:
//
//   ... ORDER BY Revision LIMIT batch_size OFFSET page * batch_size
//
// Every row is one envelope; its events are yielded in write order before
// the next row. The first empty page ends the stream. Pull-driven and
// single-pass: dropping it early leaves nothing behind on the server, and
// starting over means opening a new stream at page 0.
//
// ============================================================================

pub struct EventStream<C, E> {
    connection: C,
    table: TableName,
    bounded_context: Arc<str>,
    batch_size: usize,
    next_page: u64,
    buffered: VecDeque<E>,
    exhausted: bool,
    metrics: Arc<StoreMetrics>,
}

impl<C, E> EventStream<C, E>
where
    C: StoreConnection,
    E: DomainEvent,
{
    pub(crate) fn new(
        connection: C,
        table: TableName,
        bounded_context: &str,
        batch_size: usize,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        Self {
            connection,
            table,
            bounded_context: Arc::from(bounded_context),
            batch_size,
            next_page: 0,
            buffered: VecDeque::new(),
            exhausted: false,
            metrics,
        }
    }

    /// Next event, fetching the next page when the buffer runs dry.
    /// `Ok(None)` once an empty page has been seen.
    pub async fn try_next(&mut self) -> Result<Option<E>, StoreError> {
        loop {
            if let Some(event) = self.buffered.pop_front() {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    /// Drain the remaining events into a vector.
    pub async fn collect_remaining(&mut self) -> Result<Vec<E>, StoreError> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next().await? {
            events.push(event);
        }
        Ok(events)
    }

    /// Adapt into a [`Stream`]. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<E, StoreError>> + Send
    where
        C: 'static,
    {
        stream::try_unfold(self, |mut reader| async move {
            let next = reader.try_next().await?;
            Ok::<_, StoreError>(next.map(|event| (event, reader)))
        })
    }

    /// Index of the page the next fetch will request.
    pub fn page_index(&self) -> u64 {
        self.next_page
    }

    pub fn bounded_context(&self) -> &str {
        &self.bounded_context
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffered.is_empty()
    }

    /// Give the connection back, e.g. to close it explicitly.
    pub fn into_connection(self) -> C {
        self.connection
    }

    async fn fetch_next_page(&mut self) -> Result<(), StoreError> {
        let (offset, limit) = self.page_bounds()?;

        let rows = self
            .connection
            .fetch_event_page(&self.table, offset, limit)
            .await
            .map_err(|source| StoreError::PersistenceRead {
                table: self.table.to_string(),
                source,
            })?;

        if rows.is_empty() {
            tracing::debug!(
                bounded_context = %self.bounded_context,
                pages = self.next_page,
                "Reached end of event stream"
            );
            self.exhausted = true;
            return Ok(());
        }

        // Decode the whole page before touching the cursor so a corrupt row
        // leaves the stream where it was.
        let mut page = Vec::new();
        for row in &rows {
            let events = codec::deserialize::<E>(&row.events).map_err(|err| {
                tracing::error!(
                    bounded_context = %self.bounded_context,
                    revision = row.revision,
                    error = %err,
                    "Failed to decode event batch"
                );
                err
            })?;
            page.extend(events);
        }

        tracing::debug!(
            bounded_context = %self.bounded_context,
            page = self.next_page,
            batches = rows.len(),
            events = page.len(),
            "Loaded event page"
        );

        self.metrics.record_replayed(&self.bounded_context, page.len());
        self.buffered.extend(page);
        self.next_page += 1;
        Ok(())
    }

    fn page_bounds(&self) -> Result<(i64, i64), StoreError> {
        let limit = i64::try_from(self.batch_size)
            .map_err(|_| StoreError::InvalidArgument(format!("batch size {} too large", self.batch_size)))?;
        let offset = i64::try_from(self.next_page)
            .ok()
            .and_then(|page| page.checked_mul(limit))
            .ok_or_else(|| StoreError::InvalidArgument("stream offset overflow".to_string()))?;
        Ok((offset, limit))
    }
}
