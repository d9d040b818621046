//! Deadline-aware request execution against the backend.
//!
//! One top-level query resolution fans out into many concurrent field
//! resolutions; every backend round trip suspends here. The
//! [`ExecutionContext`] carries the per-execution deadline and the shared
//! [`QueryDetailsTracker`]; exceeding the deadline surfaces as
//! [`DoryError::DeadlineExceeded`], never as silent truncation, and the
//! error propagates so in-flight and not-yet-issued sibling requests of
//! the same execution are abandoned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time;

use crate::backend::SearchBackend;
use crate::error::{DoryError, Result};
use crate::plan::DecodeContext;
use crate::request::QueryRequest;
use crate::response::SearchResponse;
use crate::tracker::{QueryDetailsTracker, RequestMetrics};

/// Per-execution context: the shared metrics tracker and the deadline
/// every request of this execution inherits.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    tracker: Arc<QueryDetailsTracker>,
    deadline: Instant,
}

impl ExecutionContext {
    /// Create a context with a fresh tracker and the given time budget.
    pub fn new(budget: Duration) -> Self {
        ExecutionContext {
            tracker: Arc::new(QueryDetailsTracker::new()),
            deadline: Instant::now() + budget,
        }
    }

    /// Create a context sharing an existing tracker.
    pub fn with_tracker(budget: Duration, tracker: Arc<QueryDetailsTracker>) -> Self {
        ExecutionContext {
            tracker,
            deadline: Instant::now() + budget,
        }
    }

    /// The shared tracker.
    pub fn tracker(&self) -> &QueryDetailsTracker {
        &self.tracker
    }

    /// The execution deadline.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Executes [`QueryRequest`]s against a [`SearchBackend`], enforcing
/// deadlines and recording query details.
pub struct QueryExecutor {
    backend: Arc<dyn SearchBackend>,
}

impl QueryExecutor {
    /// Create an executor over a backend.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        QueryExecutor { backend }
    }

    /// Execute one request.
    ///
    /// A window that is empty before any round trip (paginating past a
    /// boundary sentinel) is short-circuited with a synthesized empty
    /// response, unless the caller also asked for totals or aggregations.
    pub async fn execute(
        &self,
        request: &QueryRequest,
        ctx: &ExecutionContext,
        decode: &DecodeContext,
    ) -> Result<SearchResponse> {
        if request.is_known_empty()
            && !request.track_total_hits
            && request.aggregations.is_empty()
        {
            return SearchResponse::adapt(Default::default(), request, decode);
        }

        let remaining = remaining_until(request.deadline)?;
        let started = Instant::now();
        let raw = time::timeout(
            remaining,
            self.backend
                .search(request.indices.clone(), request.to_body(decode)),
        )
        .await
        .map_err(|_| {
            DoryError::deadline_exceeded(format!(
                "backend search on {:?} did not complete within {:?}",
                request.indices, remaining
            ))
        })??;

        ctx.tracker().record_queries(1);
        ctx.tracker().record_request(RequestMetrics {
            client_duration: started.elapsed(),
            server_duration: Duration::from_millis(raw.took),
            queried_shards: raw.shards.total,
            index_expressions: request.indices.clone(),
            routing_values: request.routing.clone(),
        });

        SearchResponse::adapt(raw, request, decode)
    }

    /// Execute several requests in one multi-search round trip, returning
    /// one response per request in order.
    ///
    /// The round trip is recorded as a single request carrying the summed
    /// server-side metrics, with one logical query counted per
    /// sub-request.
    pub async fn execute_many(
        &self,
        requests: &[QueryRequest],
        ctx: &ExecutionContext,
        decode: &DecodeContext,
    ) -> Result<Vec<SearchResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let deadline = requests
            .iter()
            .map(|r| r.deadline)
            .min()
            .unwrap_or(ctx.deadline);
        let remaining = remaining_until(deadline)?;

        let bodies: Vec<(Vec<String>, serde_json::Value)> = requests
            .iter()
            .map(|r| (r.indices.clone(), r.to_body(decode)))
            .collect();

        let started = Instant::now();
        let raws = time::timeout(remaining, self.backend.multi_search(bodies))
            .await
            .map_err(|_| {
                DoryError::deadline_exceeded(format!(
                    "backend multi-search of {} requests did not complete within {:?}",
                    requests.len(),
                    remaining
                ))
            })??;

        if raws.len() != requests.len() {
            return Err(DoryError::backend(format!(
                "multi-search returned {} responses for {} requests",
                raws.len(),
                requests.len()
            )));
        }

        let mut index_expressions: Vec<String> = Vec::new();
        let mut routing_values: Vec<String> = Vec::new();
        for request in requests {
            index_expressions.extend(request.indices.iter().cloned());
            routing_values.extend(request.routing.iter().cloned());
        }
        ctx.tracker().record_queries(requests.len() as u64);
        ctx.tracker().record_request(RequestMetrics {
            client_duration: started.elapsed(),
            server_duration: Duration::from_millis(raws.iter().map(|r| r.took).sum()),
            queried_shards: raws.iter().map(|r| r.shards.total).sum(),
            index_expressions,
            routing_values,
        });

        requests
            .iter()
            .zip(raws)
            .map(|(request, raw)| SearchResponse::adapt(raw, request, decode))
            .collect()
    }
}

fn remaining_until(deadline: Instant) -> Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .ok_or_else(|| {
            DoryError::deadline_exceeded("request deadline elapsed before execution")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawSearchResponse;
    use crate::plan::FieldPlan;
    use futures::future::BoxFuture;
    use serde_json::{Value, json};

    struct StaticBackend {
        response: RawSearchResponse,
    }

    impl SearchBackend for StaticBackend {
        fn search(
            &self,
            _indices: Vec<String>,
            _body: Value,
        ) -> BoxFuture<'_, Result<RawSearchResponse>> {
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    struct SlowBackend {
        delay: Duration,
    }

    impl SearchBackend for SlowBackend {
        fn search(
            &self,
            _indices: Vec<String>,
            _body: Value,
        ) -> BoxFuture<'_, Result<RawSearchResponse>> {
            let delay = self.delay;
            Box::pin(async move {
                time::sleep(delay).await;
                Ok(RawSearchResponse::default())
            })
        }
    }

    fn static_backend() -> Arc<dyn SearchBackend> {
        Arc::new(StaticBackend {
            response: serde_json::from_value(json!({
                "took": 7,
                "_shards": {"total": 3, "successful": 3},
                "hits": {"hits": [
                    {"_id": "doc-1", "_source": {"name": "widget"}, "sort": ["doc-1"]}
                ]}
            }))
            .unwrap(),
        })
    }

    fn request() -> QueryRequest {
        QueryRequest::build(
            &FieldPlan::new("products"),
            vec!["products".to_string()],
            &DecodeContext::new(),
            Instant::now() + Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_execute_records_query_details() {
        let executor = QueryExecutor::new(static_backend());
        let ctx = ExecutionContext::new(Duration::from_secs(5));

        let routed = request().with_routing(vec!["tenant-1".to_string()]);
        let response = executor
            .execute(&routed, &ctx, &DecodeContext::new())
            .await
            .unwrap();
        assert_eq!(response.documents().len(), 1);

        let details = ctx.tracker().snapshot();
        assert_eq!(details.query_count, 1);
        assert_eq!(details.request_count, 1);
        assert_eq!(details.server_duration, Duration::from_millis(7));
        assert_eq!(details.queried_shards, 3);
        assert_eq!(details.index_expressions, vec!["products".to_string()]);
        assert_eq!(details.routing_values, vec!["tenant-1".to_string()]);
    }

    #[tokio::test]
    async fn test_deadline_exceeded_surfaces_as_timeout() {
        let executor = QueryExecutor::new(Arc::new(SlowBackend {
            delay: Duration::from_millis(200),
        }));
        let ctx = ExecutionContext::new(Duration::from_millis(20));

        let mut request = request();
        request.deadline = ctx.deadline();
        let err = executor
            .execute(&request, &ctx, &DecodeContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DoryError::DeadlineExceeded(_)));
    }

    #[tokio::test]
    async fn test_elapsed_deadline_fails_before_issuing() {
        let executor = QueryExecutor::new(static_backend());
        let ctx = ExecutionContext::new(Duration::from_secs(5));

        let mut request = request();
        request.deadline = Instant::now() - Duration::from_millis(1);
        let err = executor
            .execute(&request, &ctx, &DecodeContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DoryError::DeadlineExceeded(_)));
        // Nothing was recorded for the abandoned request.
        assert_eq!(ctx.tracker().snapshot().request_count, 0);
    }

    #[tokio::test]
    async fn test_execute_many_records_one_round_trip() {
        let executor = QueryExecutor::new(static_backend());
        let ctx = ExecutionContext::new(Duration::from_secs(5));

        let requests = vec![request(), request(), request()];
        let responses = executor
            .execute_many(&requests, &ctx, &DecodeContext::new())
            .await
            .unwrap();
        assert_eq!(responses.len(), 3);

        let details = ctx.tracker().snapshot();
        assert_eq!(details.query_count, 3);
        assert_eq!(details.request_count, 1);
        assert_eq!(details.server_duration, Duration::from_millis(21));
    }
}
