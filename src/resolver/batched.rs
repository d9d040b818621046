//! Batched relationship resolution.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::executor::{ExecutionContext, QueryExecutor};
use crate::pagination::Connection;
use crate::plan::{DecodeContext, FieldPlan};
use crate::resolver::{RelationshipResolver, RelationshipSpec, parent_keys, related_request};
use crate::response::TypedDocument;

/// Resolves a whole wave of parents with a single backend request over the
/// union of their relationship keys, then splits the combined response
/// back into per-parent results.
///
/// Output is indistinguishable from [`PerParentResolver`]'s: same
/// documents, same order, same pagination metadata. The combined request
/// is sized at `(limit + 1) × distinct keys` so each parent's derived page
/// keeps its overflow item for `has_next_page` detection.
pub struct BatchedResolver {
    executor: Arc<QueryExecutor>,
}

impl BatchedResolver {
    /// Create a batched resolver over an executor.
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        BatchedResolver { executor }
    }
}

impl RelationshipResolver for BatchedResolver {
    fn resolve<'a>(
        &'a self,
        parents: &'a [TypedDocument],
        plan: &'a FieldPlan,
        relationship: &'a RelationshipSpec,
        ctx: &'a ExecutionContext,
        decode: &'a DecodeContext,
    ) -> BoxFuture<'a, Result<Vec<Connection<TypedDocument>>>> {
        Box::pin(async move {
            let keys_by_parent: Vec<Vec<Value>> = parents
                .iter()
                .map(|parent| parent_keys(parent, relationship))
                .collect();

            let mut key_union: Vec<Value> = Vec::new();
            for keys in &keys_by_parent {
                for key in keys {
                    if !key_union.contains(key) {
                        key_union.push(key.clone());
                    }
                }
            }
            if key_union.is_empty() {
                return Ok(vec![Connection::empty(); parents.len()]);
            }

            let request = related_request(plan, relationship, &key_union, ctx, decode)?;
            let batch_size = request.window.fetch_size_for(key_union.len());
            let request = request.with_fetch_size(batch_size);
            debug!(
                relationship = %relationship.name,
                parents = parents.len(),
                keys = key_union.len(),
                fetch_size = batch_size,
                "coalescing relationship wave into one request"
            );

            let response = self.executor.execute(&request, ctx, decode).await?;

            let mut connections = Vec::with_capacity(parents.len());
            for keys in keys_by_parent {
                if keys.is_empty() {
                    connections.push(Connection::empty());
                    continue;
                }
                let derived = response.filter_results(
                    &relationship.target_field,
                    &keys,
                    request.window.fetch_size(),
                );
                connections.push(derived.into_connection(&request.window, &request.sort)?);
            }
            Ok(connections)
        })
    }
}
