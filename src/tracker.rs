//! Cross-cutting query execution metrics.
//!
//! A [`QueryDetailsTracker`] lives for the duration of one top-level
//! GraphQL execution and is the only structure mutated from concurrent
//! resolution paths; every mutating operation is serialized under a single
//! mutex. Readers take a [`snapshot`](QueryDetailsTracker::snapshot) after
//! concurrent resolution completes.

use std::time::Duration;

use ahash::AHashSet;
use parking_lot::Mutex;

use crate::error::{DoryError, Result};

/// Metrics of one backend round trip.
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    /// Round-trip duration observed by this client.
    pub client_duration: Duration,
    /// Execution duration reported by the backend.
    pub server_duration: Duration,
    /// Shards the backend queried.
    pub queried_shards: u64,
    /// Index expressions the request targeted.
    pub index_expressions: Vec<String>,
    /// Shard-routing values the request touched.
    pub routing_values: Vec<String>,
}

/// An accumulated view of one execution's query details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDetails {
    /// Distinct shard-routing values touched, sorted.
    pub routing_values: Vec<String>,
    /// Distinct index expressions queried, sorted.
    pub index_expressions: Vec<String>,
    /// Logical queries issued (several may share one request).
    pub query_count: u64,
    /// Backend round trips made.
    pub request_count: u64,
    /// Sum of client-observed durations.
    pub client_duration: Duration,
    /// Sum of server-reported durations.
    pub server_duration: Duration,
    /// Sum of queried shard counts.
    pub queried_shards: u64,
}

#[derive(Debug, Default)]
struct TrackerInner {
    routing_values: AHashSet<String>,
    index_expressions: AHashSet<String>,
    query_count: u64,
    request_count: u64,
    client_duration: Duration,
    server_duration: Duration,
    queried_shards: u64,
}

/// Shared, mutually-exclusive-write accumulator of query details.
///
/// Created fresh per top-level execution and passed explicitly through the
/// execution context.
#[derive(Debug, Default)]
pub struct QueryDetailsTracker {
    inner: Mutex<TrackerInner>,
}

impl QueryDetailsTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch of logical queries being issued.
    pub fn record_queries(&self, count: u64) {
        self.inner.lock().query_count += count;
    }

    /// Record the metrics of one backend round trip.
    pub fn record_request(&self, metrics: RequestMetrics) {
        let mut inner = self.inner.lock();
        inner.request_count += 1;
        inner.client_duration += metrics.client_duration;
        inner.server_duration += metrics.server_duration;
        inner.queried_shards += metrics.queried_shards;
        inner.index_expressions.extend(metrics.index_expressions);
        inner.routing_values.extend(metrics.routing_values);
    }

    /// Snapshot the accumulated totals. Set-valued details come out
    /// sorted so snapshots are deterministic.
    pub fn snapshot(&self) -> QueryDetails {
        let inner = self.inner.lock();
        let mut routing_values: Vec<String> = inner.routing_values.iter().cloned().collect();
        routing_values.sort();
        let mut index_expressions: Vec<String> =
            inner.index_expressions.iter().cloned().collect();
        index_expressions.sort();

        QueryDetails {
            routing_values,
            index_expressions,
            query_count: inner.query_count,
            request_count: inner.request_count,
            client_duration: inner.client_duration,
            server_duration: inner.server_duration,
            queried_shards: inner.queried_shards,
        }
    }

    /// Time spent on the wire: client-observed duration minus
    /// server-reported duration.
    ///
    /// A negative value indicates a clock or measurement bug and is
    /// surfaced as an error, not clamped.
    pub fn transport_duration(&self) -> Result<Duration> {
        let inner = self.inner.lock();
        inner
            .client_duration
            .checked_sub(inner.server_duration)
            .ok_or_else(|| {
                DoryError::tracker(format!(
                    "server duration {:?} exceeds client duration {:?}",
                    inner.server_duration, inner.client_duration
                ))
            })
    }
}
