//! Per-parent relationship resolution.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::executor::{ExecutionContext, QueryExecutor};
use crate::pagination::Connection;
use crate::plan::{DecodeContext, FieldPlan};
use crate::resolver::{RelationshipResolver, RelationshipSpec, parent_keys, related_request};
use crate::response::TypedDocument;

/// Resolves each parent's related documents with an independent backend
/// request. Simplest and correct, at the cost of O(parents) round trips.
pub struct PerParentResolver {
    executor: Arc<QueryExecutor>,
}

impl PerParentResolver {
    /// Create a per-parent resolver over an executor.
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        PerParentResolver { executor }
    }
}

impl RelationshipResolver for PerParentResolver {
    fn resolve<'a>(
        &'a self,
        parents: &'a [TypedDocument],
        plan: &'a FieldPlan,
        relationship: &'a RelationshipSpec,
        ctx: &'a ExecutionContext,
        decode: &'a DecodeContext,
    ) -> BoxFuture<'a, Result<Vec<Connection<TypedDocument>>>> {
        Box::pin(async move {
            // Sibling resolutions run concurrently; results come back in
            // parent order regardless of completion order.
            let resolutions = parents.iter().map(|parent| async move {
                let keys = parent_keys(parent, relationship);
                if keys.is_empty() {
                    return Ok(Connection::empty());
                }
                let request = related_request(plan, relationship, &keys, ctx, decode)?;
                let response = self.executor.execute(&request, ctx, decode).await?;
                response.into_connection(&request.window, &request.sort)
            });
            futures::future::try_join_all(resolutions).await
        })
    }
}
