//! Outbound interface to the document-search backend.
//!
//! The wire client itself is an external collaborator; this module only
//! specifies the seam: a [`SearchBackend`] exposing `search`/`multi_search`
//! over JSON-like bodies, and the raw response shapes
//! (`hits.hits[]`, `hits.total.value`, `aggregations`, shard/timing
//! metadata) that come back.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Per-request shard metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardInfo {
    /// Shards targeted by the request.
    #[serde(default)]
    pub total: u64,
    /// Shards that answered.
    #[serde(default)]
    pub successful: u64,
    /// Shards skipped by pre-filtering.
    #[serde(default)]
    pub skipped: u64,
    /// Shards that failed.
    #[serde(default)]
    pub failed: u64,
}

/// The backend-reported total hit count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTotal {
    /// Number of matching documents.
    pub value: u64,
    /// Whether the value is exact (`eq`) or a lower bound (`gte`).
    #[serde(default)]
    pub relation: String,
}

/// One raw hit from the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHit {
    /// Backend identity of the document.
    #[serde(rename = "_id")]
    pub id: String,
    /// Index the document came from.
    #[serde(rename = "_index", default)]
    pub index: String,
    /// The document source fields.
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
    /// Raw sort-key values for this hit, one per sort clause.
    #[serde(default)]
    pub sort: Vec<Value>,
    /// Highlight snippets, keyed by internal field name.
    #[serde(default)]
    pub highlight: HashMap<String, Vec<String>>,
}

/// The raw `hits` section of a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHits {
    /// Total matching documents; absent unless tracking was requested.
    #[serde(default)]
    pub total: Option<RawTotal>,
    /// The returned hits, in sort order.
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

/// One raw backend search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSearchResponse {
    /// Server-reported execution time in milliseconds.
    #[serde(default)]
    pub took: u64,
    /// Shard metadata.
    #[serde(rename = "_shards", default)]
    pub shards: ShardInfo,
    /// The hits section.
    #[serde(default)]
    pub hits: RawHits,
    /// Raw aggregation output, when aggregations were requested.
    #[serde(default)]
    pub aggregations: Option<Value>,
}

/// The document-search backend seam.
///
/// Implementations own transport, connection pooling, and retries; this
/// crate only issues bodies and decodes responses.
pub trait SearchBackend: Send + Sync {
    /// Execute one search request against the given index expressions.
    fn search(
        &self,
        indices: Vec<String>,
        body: Value,
    ) -> BoxFuture<'_, Result<RawSearchResponse>>;

    /// Execute several search requests in one round trip, returning one
    /// response per request in order.
    ///
    /// The default implementation issues the requests sequentially;
    /// backends with a native multi-search endpoint should override it.
    fn multi_search(
        &self,
        requests: Vec<(Vec<String>, Value)>,
    ) -> BoxFuture<'_, Result<Vec<RawSearchResponse>>> {
        Box::pin(async move {
            let mut responses = Vec::with_capacity(requests.len());
            for (indices, body) in requests {
                responses.push(self.search(indices, body).await?);
            }
            Ok(responses)
        })
    }
}
