use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for the event store
// ============================================================================
//
// Covers:
// - Event batch appends (throughput, failures, latency)
// - Snapshot writes (throughput, conflicts, failures, latency)
// - Replay throughput
// - Snapshot loads (hit / miss)
//
// Everything is labelled by bounded context. Exposing the registry (HTTP
// scrape endpoint, push gateway) is up to the application.
// ============================================================================

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

pub struct StoreMetrics {
    registry: Registry,

    // Append Metrics
    pub event_batches_appended: IntCounterVec,
    pub events_appended: IntCounterVec,
    pub append_failures: IntCounterVec,
    pub append_duration: HistogramVec,

    // Snapshot Metrics
    pub snapshots_written: IntCounterVec,
    pub snapshot_conflicts: IntCounterVec,
    pub snapshot_write_failures: IntCounterVec,
    pub snapshot_write_duration: HistogramVec,
    pub snapshot_loads: IntCounterVec,

    // Replay Metrics
    pub events_replayed: IntCounterVec,
}

impl StoreMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the store's metrics in an existing registry.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let event_batches_appended = IntCounterVec::new(
            Opts::new("event_store_batches_appended_total", "Event batches appended"),
            &["bounded_context"],
        )?;
        registry.register(Box::new(event_batches_appended.clone()))?;

        let events_appended = IntCounterVec::new(
            Opts::new("event_store_events_appended_total", "Events appended"),
            &["bounded_context"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let append_failures = IntCounterVec::new(
            Opts::new("event_store_append_failures_total", "Event batch appends that failed"),
            &["bounded_context"],
        )?;
        registry.register(Box::new(append_failures.clone()))?;

        let append_duration = HistogramVec::new(
            HistogramOpts::new("event_store_append_duration_seconds", "Event batch append duration")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["bounded_context"],
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        let snapshots_written = IntCounterVec::new(
            Opts::new("event_store_snapshots_written_total", "Snapshots written"),
            &["bounded_context"],
        )?;
        registry.register(Box::new(snapshots_written.clone()))?;

        let snapshot_conflicts = IntCounterVec::new(
            Opts::new("event_store_snapshot_conflicts_total", "Snapshot writes rejected by the uniqueness constraint"),
            &["bounded_context"],
        )?;
        registry.register(Box::new(snapshot_conflicts.clone()))?;

        let snapshot_write_failures = IntCounterVec::new(
            Opts::new("event_store_snapshot_write_failures_total", "Snapshot writes that failed for reasons other than a conflict"),
            &["bounded_context"],
        )?;
        registry.register(Box::new(snapshot_write_failures.clone()))?;

        let snapshot_write_duration = HistogramVec::new(
            HistogramOpts::new("event_store_snapshot_write_duration_seconds", "Snapshot bulk write duration")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["bounded_context"],
        )?;
        registry.register(Box::new(snapshot_write_duration.clone()))?;

        let snapshot_loads = IntCounterVec::new(
            Opts::new("event_store_snapshot_loads_total", "Latest-snapshot lookups"),
            &["bounded_context", "outcome"],
        )?;
        registry.register(Box::new(snapshot_loads.clone()))?;

        let events_replayed = IntCounterVec::new(
            Opts::new("event_store_events_replayed_total", "Events yielded by replay streams"),
            &["bounded_context"],
        )?;
        registry.register(Box::new(events_replayed.clone()))?;

        Ok(Self {
            registry,
            event_batches_appended,
            events_appended,
            append_failures,
            append_duration,
            snapshots_written,
            snapshot_conflicts,
            snapshot_write_failures,
            snapshot_write_duration,
            snapshot_loads,
            events_replayed,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_append(&self, bounded_context: &str, event_count: usize, duration_secs: f64, success: bool) {
        if success {
            self.event_batches_appended.with_label_values(&[bounded_context]).inc();
            self.events_appended
                .with_label_values(&[bounded_context])
                .inc_by(event_count as u64);
        } else {
            self.append_failures.with_label_values(&[bounded_context]).inc();
        }
        self.append_duration.with_label_values(&[bounded_context]).observe(duration_secs);
    }

    pub fn record_snapshot_write(&self, bounded_context: &str, count: usize, duration_secs: f64, conflict: bool) {
        if conflict {
            self.snapshot_conflicts.with_label_values(&[bounded_context]).inc();
        } else {
            self.snapshots_written
                .with_label_values(&[bounded_context])
                .inc_by(count as u64);
        }
        self.snapshot_write_duration
            .with_label_values(&[bounded_context])
            .observe(duration_secs);
    }

    /// A snapshot write that failed without a uniqueness conflict.
    pub fn record_snapshot_write_failure(&self, bounded_context: &str, duration_secs: f64) {
        self.snapshot_write_failures.with_label_values(&[bounded_context]).inc();
        self.snapshot_write_duration
            .with_label_values(&[bounded_context])
            .observe(duration_secs);
    }

    pub fn record_snapshot_load(&self, bounded_context: &str, found: bool) {
        let outcome = if found { "hit" } else { "miss" };
        self.snapshot_loads.with_label_values(&[bounded_context, outcome]).inc();
    }

    pub fn record_replayed(&self, bounded_context: &str, event_count: usize) {
        self.events_replayed
            .with_label_values(&[bounded_context])
            .inc_by(event_count as u64);
    }
}
