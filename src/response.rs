//! Backend response adaptation into typed results.
//!
//! [`SearchResponse::adapt`] turns one raw backend round trip into typed
//! documents, decoded aggregation buckets, and response metadata.
//! [`SearchResponse::into_connection`] drives the cursor codec in reverse
//! to emit connection pages. [`SearchResponse::filter_results`]
//! reconstructs the per-query responses of a merged fan-in request.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::aggregation::{self, AggregationBucket};
use crate::backend::{RawHit, RawSearchResponse};
use crate::cursor::{self, Cursor, SortSpec};
use crate::error::{DoryError, Result};
use crate::pagination::{self, Connection, Edge, PageInfo, PageWindow};
use crate::plan::{DEFAULT_ID_FIELD, DecodeContext, FieldPath};
use crate::request::QueryRequest;

/// A typed document decoded from one backend hit.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TypedDocument {
    /// Backend identity.
    pub id: String,
    /// Index the document came from.
    pub index: String,
    /// Decoded source fields.
    pub source: Map<String, Value>,
    /// Raw sort-key values, kept for cursor construction.
    pub sort_values: Vec<Value>,
    /// Highlight snippets keyed by externally visible field name.
    pub highlights: HashMap<String, Vec<String>>,
}

impl TypedDocument {
    /// Decode one raw hit, remapping highlight field names from the
    /// backend's internal names to the externally visible ones.
    fn from_hit(hit: RawHit, ctx: &DecodeContext) -> TypedDocument {
        let mut highlights: HashMap<String, Vec<String>> = HashMap::new();
        for (internal, snippets) in hit.highlight {
            match ctx.external_highlight_names(&internal) {
                Some(externals) if !externals.is_empty() => {
                    for external in externals {
                        highlights
                            .entry(external.clone())
                            .or_default()
                            .extend(snippets.iter().cloned());
                    }
                }
                // A harmless mapping gap: drop the snippet rather than
                // fail the resolution.
                _ => {
                    debug!(field = %internal, "dropping highlight for unmapped internal field");
                }
            }
        }

        TypedDocument {
            id: hit.id,
            index: hit.index,
            source: hit.source,
            sort_values: hit.sort,
            highlights,
        }
    }

    /// The first value at a field path, if present.
    pub fn field(&self, path: &FieldPath) -> Option<Value> {
        self.values_at(path).into_iter().next()
    }

    /// The first value at a field path parsed as an RFC 3339 timestamp.
    pub fn datetime_field(&self, path: &FieldPath) -> Option<DateTime<Utc>> {
        self.field(path)
            .and_then(|v| v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Every value at a field path, flattening arrays along the way.
    pub fn values_at(&self, path: &FieldPath) -> Vec<Value> {
        let mut out = Vec::new();
        let root = Value::Object(self.source.clone());
        collect_values(&root, path.segments(), &mut out);
        out
    }
}

fn collect_values(value: &Value, segments: &[String], out: &mut Vec<Value>) {
    match segments.split_first() {
        None => match value {
            Value::Array(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        },
        Some((head, rest)) => match value {
            Value::Object(map) => {
                if let Some(next) = map.get(head) {
                    collect_values(next, rest, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    collect_values(item, segments, out);
                }
            }
            _ => {}
        },
    }
}

/// Raw metadata of one backend round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    /// Server-reported execution time.
    pub took: Duration,
    /// Shards targeted by the request.
    pub total_shards: u64,
    /// Shards that answered.
    pub successful_shards: u64,
}

/// The immutable result of one backend round trip.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    documents: Vec<TypedDocument>,
    total: Option<u64>,
    aggregations: Vec<AggregationBucket>,
    aggregations_unavailable_reason: Option<String>,
    metadata: ResponseMetadata,
    id_field: String,
}

impl SearchResponse {
    /// Adapt one raw backend response.
    ///
    /// The total is only carried when the request declared
    /// `track_total_hits`; aggregation buckets are decoded against the
    /// request's grouping levels.
    pub fn adapt(
        raw: RawSearchResponse,
        request: &QueryRequest,
        ctx: &DecodeContext,
    ) -> Result<SearchResponse> {
        let total = if request.track_total_hits {
            raw.hits.total.map(|t| t.value)
        } else {
            None
        };

        let aggregations = match (&raw.aggregations, request.aggregations.is_empty()) {
            (Some(raw_aggs), false) => {
                aggregation::decode_aggregations(raw_aggs, request.aggregations.levels(), ctx)?
            }
            _ => Vec::new(),
        };

        let documents = raw
            .hits
            .hits
            .into_iter()
            .map(|hit| TypedDocument::from_hit(hit, ctx))
            .collect();

        Ok(SearchResponse {
            documents,
            total,
            aggregations,
            aggregations_unavailable_reason: None,
            metadata: ResponseMetadata {
                took: Duration::from_millis(raw.took),
                total_shards: raw.shards.total,
                successful_shards: raw.shards.successful,
            },
            id_field: ctx.id_field().to_string(),
        })
    }

    /// Synthesize a response directly from known identities, with a
    /// correct but zero-cost metadata shape and no backend round trip.
    pub fn from_identities<S: AsRef<str>>(ids: &[S]) -> SearchResponse {
        SearchResponse {
            documents: ids
                .iter()
                .map(|id| TypedDocument {
                    id: id.as_ref().to_string(),
                    ..Default::default()
                })
                .collect(),
            total: None,
            aggregations: Vec::new(),
            aggregations_unavailable_reason: None,
            metadata: ResponseMetadata::default(),
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }

    /// The decoded documents, in backend sort order.
    pub fn documents(&self) -> &[TypedDocument] {
        &self.documents
    }

    /// Consume the response, yielding its documents.
    pub fn into_documents(self) -> Vec<TypedDocument> {
        self.documents
    }

    /// Round-trip metadata.
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// The backend-reported total document count.
    ///
    /// Fails with [`DoryError::CountUnavailable`] when the request did not
    /// declare the need up front.
    pub fn total_count(&self) -> Result<u64> {
        self.total.ok_or(DoryError::CountUnavailable)
    }

    /// Decoded aggregation buckets.
    ///
    /// Fails with [`DoryError::AggregationsUnavailable`] when this
    /// response was derived by in-process filtering, carrying the reason.
    pub fn aggregations(&self) -> Result<&[AggregationBucket]> {
        match &self.aggregations_unavailable_reason {
            Some(reason) => Err(DoryError::aggregations_unavailable(reason.clone())),
            None => Ok(&self.aggregations),
        }
    }

    /// Why aggregations are unavailable, if they are.
    pub fn aggregations_unavailable_reason(&self) -> Option<&str> {
        self.aggregations_unavailable_reason.as_deref()
    }

    /// Reconstruct the response one of several merged queries would have
    /// received: hits whose value(s) at `field_path` intersect
    /// `allowed_values`, truncated to `size`.
    ///
    /// The identity field path filters on backend identity directly, so it
    /// need not be present in the document body. Aggregations are marked
    /// unavailable on the derived response: post-hoc in-memory filtering
    /// invalidates backend-computed aggregate values.
    pub fn filter_results(
        &self,
        field_path: &FieldPath,
        allowed_values: &[Value],
        size: usize,
    ) -> SearchResponse {
        let is_identity =
            field_path.depth() == 1 && field_path.segments()[0] == self.id_field;

        let documents: Vec<TypedDocument> = self
            .documents
            .iter()
            .filter(|doc| {
                if is_identity {
                    allowed_values.iter().any(|v| v.as_str() == Some(doc.id.as_str()))
                } else {
                    doc.values_at(field_path)
                        .iter()
                        .any(|v| allowed_values.contains(v))
                }
            })
            .take(size)
            .cloned()
            .collect();

        SearchResponse {
            documents,
            total: None,
            aggregations: Vec::new(),
            aggregations_unavailable_reason: Some(format!(
                "results were filtered in process on `{field_path}`; backend aggregations no longer apply"
            )),
            metadata: self.metadata.clone(),
            id_field: self.id_field.clone(),
        }
    }

    /// Assemble a connection page from this response.
    ///
    /// The window must be the one the backend request was sized with; the
    /// sort spec must be the tie-broken spec the sort values were produced
    /// under.
    pub fn into_connection(
        self,
        window: &PageWindow,
        spec: &SortSpec,
    ) -> Result<Connection<TypedDocument>> {
        let total_count = self.total;
        let page = pagination::paginate(self.documents, window);

        let mut edges = Vec::with_capacity(page.items.len());
        for document in page.items {
            let encoded = cursor::encode(&Cursor::At(document.sort_values.clone()), spec)?;
            edges.push(Edge {
                cursor: encoded,
                node: document,
            });
        }

        let page_info = PageInfo {
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
            has_next_page: page.has_next,
            has_previous_page: page.has_previous,
        };

        Ok(Connection {
            nodes: edges.iter().map(|e| e.node.clone()).collect(),
            edges,
            page_info,
            total_count,
        })
    }
}
