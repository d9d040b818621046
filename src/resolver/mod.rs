//! Nested cross-type relationship resolution.
//!
//! A relationship field connects parent documents of one type to documents
//! of another by key(s) carried on the parent. Two interchangeable
//! strategies resolve it: [`PerParentResolver`] issues one backend request
//! per parent, [`BatchedResolver`] issues a single request over the union
//! of keys and splits the combined response back per parent. For any set of
//! parents and any filter/sort configuration, both strategies produce
//! identical logical results; this is the central correctness contract of
//! the crate.

pub mod batched;
pub mod per_parent;
pub mod registry;

pub use batched::BatchedResolver;
pub use per_parent::PerParentResolver;
pub use registry::ResolverRegistry;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Result;
use crate::executor::{ExecutionContext, QueryExecutor};
use crate::filter::{self, FilterExpression};
use crate::pagination::Connection;
use crate::plan::{DecodeContext, FieldPath, FieldPlan};
use crate::request::{QueryRequest, RequestOverrides};
use crate::response::TypedDocument;

/// Describes a nested relationship field from parent documents of one type
/// to related documents of another.
#[derive(Debug, Clone)]
pub struct RelationshipSpec {
    /// The relationship field's name on the parent type.
    pub name: String,
    /// Path on the parent holding the related document key(s).
    pub key_field: FieldPath,
    /// Index expressions of the related document type.
    pub target_indices: Vec<String>,
    /// Path on the related document that the parent keys refer to.
    pub target_field: FieldPath,
}

/// Which resolution strategy to use, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// One backend request per parent.
    PerParent,
    /// One backend request per concurrency wave.
    Batched,
}

/// A relationship resolution strategy.
///
/// `resolve` receives the whole concurrency wave of parents at once; this
/// is the collection barrier that lets the batched strategy coalesce
/// sibling requests before any is issued.
pub trait RelationshipResolver: Send + Sync {
    /// Resolve the relationship for a wave of parents, returning one
    /// connection per parent, in parent order.
    fn resolve<'a>(
        &'a self,
        parents: &'a [TypedDocument],
        plan: &'a FieldPlan,
        relationship: &'a RelationshipSpec,
        ctx: &'a ExecutionContext,
        decode: &'a DecodeContext,
    ) -> BoxFuture<'a, Result<Vec<Connection<TypedDocument>>>>;
}

/// Construct the resolver for a configured mode.
pub fn resolver_for(
    mode: ResolutionMode,
    executor: Arc<QueryExecutor>,
) -> Box<dyn RelationshipResolver> {
    match mode {
        ResolutionMode::PerParent => Box::new(PerParentResolver::new(executor)),
        ResolutionMode::Batched => Box::new(BatchedResolver::new(executor)),
    }
}

/// The relationship key values one parent carries, deduplicated in first
/// appearance order.
pub(crate) fn parent_keys(parent: &TypedDocument, relationship: &RelationshipSpec) -> Vec<Value> {
    let mut keys = Vec::new();
    for value in parent.values_at(&relationship.key_field) {
        if !value.is_null() && !keys.contains(&value) {
            keys.push(value);
        }
    }
    keys
}

/// Build the related-document request for a set of keys: the plan's own
/// request against the target indices, with a key-set membership filter
/// ANDed in.
pub(crate) fn related_request(
    plan: &FieldPlan,
    relationship: &RelationshipSpec,
    keys: &[Value],
    ctx: &ExecutionContext,
    decode: &DecodeContext,
) -> Result<QueryRequest> {
    let key_filter = filter::compile(&FilterExpression::any_of(
        relationship.target_field.clone(),
        keys.to_vec(),
    ))?;

    Ok(QueryRequest::build(
        plan,
        relationship.target_indices.clone(),
        decode,
        ctx.deadline(),
    )?
    .merge(RequestOverrides {
        filters: Some(key_filter),
        ..Default::default()
    }))
}
