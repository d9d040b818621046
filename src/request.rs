//! Backend request assembly from field-level query plans.
//!
//! A [`QueryRequest`] is built once per resolved GraphQL field and owned
//! exclusively by that field's resolution until execution completes. The
//! JSON body rendering is kept separate from building so the request shape
//! can be asserted on without a backend.

use std::time::Instant;

use serde_json::{Value, json};

use crate::aggregation::AggregationsSpec;
use crate::cursor::SortSpec;
use crate::error::Result;
use crate::filter::{self, CompiledBooleanQuery};
use crate::pagination::{PageDirection, PageWindow};
use crate::plan::{DecodeContext, FieldPlan};

/// Which source fields to request from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFields {
    /// Request every source field. Used when the full document is needed,
    /// e.g. federation-style entity lookups.
    All,
    /// Request only the named fields, avoiding over-fetch on wide
    /// documents.
    Fields(Vec<String>),
}

/// Highlight targets for a request.
///
/// "All highlights" and specific named targets may combine; when neither is
/// set, no highlight data is computed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighlightSpec {
    /// Highlight every highlightable field.
    pub all: bool,
    /// Specific internal field names to highlight.
    pub fields: Vec<String>,
}

impl HighlightSpec {
    /// No highlighting.
    pub fn none() -> Self {
        Self::default()
    }

    /// Highlight every highlightable field.
    pub fn all() -> Self {
        HighlightSpec {
            all: true,
            fields: Vec::new(),
        }
    }

    /// Add a named highlight target.
    pub fn field<S: Into<String>>(mut self, field: S) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Whether any highlight data was requested.
    pub fn is_enabled(&self) -> bool {
        self.all || !self.fields.is_empty()
    }

    /// Render the backend highlight body, if enabled.
    pub fn to_body(&self) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        let mut fields = serde_json::Map::new();
        if self.all {
            fields.insert("*".to_string(), json!({}));
        }
        for field in &self.fields {
            fields.insert(field.clone(), json!({}));
        }
        Some(json!({"fields": fields}))
    }
}

/// A complete backend request for one field resolution.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Index expressions to query.
    pub indices: Vec<String>,
    /// Compiled filter clauses.
    pub filters: CompiledBooleanQuery,
    /// Source field projection.
    pub source: SourceFields,
    /// Sort spec, tie-break included.
    pub sort: SortSpec,
    /// Resolved page window.
    pub window: PageWindow,
    /// Number of items to request; `window.fetch_size()` unless a batch
    /// widened it.
    pub fetch_size: usize,
    /// Whether to ask the backend for the total document count.
    /// `track_total_hits` is expensive at scale, so callers declare the
    /// need up front.
    pub track_total_hits: bool,
    /// Aggregation groupings.
    pub aggregations: AggregationsSpec,
    /// Highlight targets.
    pub highlight: HighlightSpec,
    /// Shard-routing values for the request, when the caller can route.
    pub routing: Vec<String>,
    /// Execution deadline for this request.
    pub deadline: Instant,
}

/// Overrides layered onto an existing request by [`QueryRequest::merge`].
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    /// Extra filters, ANDed with the request's own.
    pub filters: Option<CompiledBooleanQuery>,
    /// Replacement sort spec.
    pub sort: Option<SortSpec>,
    /// Replacement page window.
    pub window: Option<PageWindow>,
    /// Replacement highlight spec.
    pub highlight: Option<HighlightSpec>,
}

impl QueryRequest {
    /// Build a request from a field plan.
    ///
    /// Compiles the plan's filter expression, appends the identity
    /// tie-break to the sort spec, and decodes the page cursor against it.
    pub fn build(
        plan: &FieldPlan,
        indices: Vec<String>,
        ctx: &DecodeContext,
        deadline: Instant,
    ) -> Result<QueryRequest> {
        let filters = match &plan.filter {
            Some(expr) => filter::compile(expr)?,
            None => CompiledBooleanQuery::match_all(),
        };
        let sort = plan.sort.clone().ensure_tie_break(ctx.id_field());
        let window = plan.page.window(&sort)?;
        let source = if plan.all_fields {
            SourceFields::All
        } else {
            SourceFields::Fields(plan.selections.iter().map(|p| p.key()).collect())
        };

        Ok(QueryRequest {
            indices,
            filters,
            source,
            fetch_size: window.fetch_size(),
            window,
            sort,
            track_total_hits: plan.total_count_needed,
            aggregations: AggregationsSpec::new(plan.group_by.clone()),
            highlight: plan.highlight.clone(),
            routing: Vec::new(),
            deadline,
        })
    }

    /// Combine this request with overrides from another contributor (for
    /// example a query interceptor layering additional filters).
    ///
    /// Filters are ANDed; sort, pagination, and highlight settings from
    /// the override take precedence.
    pub fn merge(mut self, overrides: RequestOverrides) -> QueryRequest {
        if let Some(filters) = overrides.filters {
            self.filters = self.filters.and(filters);
        }
        if let Some(sort) = overrides.sort {
            self.sort = sort;
        }
        if let Some(window) = overrides.window {
            self.fetch_size = window.fetch_size();
            self.window = window;
        }
        if let Some(highlight) = overrides.highlight {
            self.highlight = highlight;
        }
        self
    }

    /// Widen the fetch size, for batch requests serving several logical
    /// queries at once.
    pub fn with_fetch_size(mut self, fetch_size: usize) -> QueryRequest {
        self.fetch_size = fetch_size;
        self
    }

    /// Set the shard-routing values for this request.
    pub fn with_routing(mut self, routing: Vec<String>) -> QueryRequest {
        self.routing = routing;
        self
    }

    /// Whether this window is empty without asking the backend.
    pub fn is_known_empty(&self) -> bool {
        self.window.known_empty()
    }

    /// Render the backend JSON body for this request.
    pub fn to_body(&self, ctx: &DecodeContext) -> Value {
        let effective_sort = match self.window.direction {
            PageDirection::Forward => self.sort.clone(),
            PageDirection::Backward => self.sort.reversed(),
        };

        let mut body = json!({
            "query": self.filters.to_query(),
            "size": self.fetch_size,
            "sort": effective_sort.to_body(),
            "track_total_hits": self.track_total_hits,
        });

        body["_source"] = match &self.source {
            SourceFields::All => json!(true),
            SourceFields::Fields(fields) => json!(fields),
        };
        if let Some(keys) = self.window.search_after() {
            body["search_after"] = json!(keys);
        }
        if !self.aggregations.is_empty() {
            body["aggs"] = self.aggregations.to_body(ctx);
        }
        if let Some(highlight) = self.highlight.to_body() {
            body["highlight"] = highlight;
        }
        body
    }
}
