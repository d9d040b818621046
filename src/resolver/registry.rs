//! Explicit resolver strategy registry.
//!
//! Resolver variants form a closed, compile-time-known set; pluggability
//! comes from an explicit name-to-constructor mapping rather than
//! reflection-based loading.

use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{DoryError, Result};
use crate::executor::QueryExecutor;
use crate::resolver::{BatchedResolver, PerParentResolver, RelationshipResolver};

/// Constructor for one resolver strategy.
pub type ResolverConstructor = fn(Arc<QueryExecutor>) -> Box<dyn RelationshipResolver>;

/// Maps strategy names to resolver constructors.
#[derive(Default)]
pub struct ResolverRegistry {
    constructors: AHashMap<String, ResolverConstructor>,
}

impl ResolverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in strategies registered under
    /// `per_parent` and `batched`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("per_parent", |executor| {
            Box::new(PerParentResolver::new(executor))
        });
        registry.register("batched", |executor| Box::new(BatchedResolver::new(executor)));
        registry
    }

    /// Register a strategy constructor under a name, replacing any
    /// previous registration.
    pub fn register<S: Into<String>>(&mut self, name: S, constructor: ResolverConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// The registered strategy names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Construct the resolver registered under a name.
    pub fn create(
        &self,
        name: &str,
        executor: Arc<QueryExecutor>,
    ) -> Result<Box<dyn RelationshipResolver>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| DoryError::UnknownResolver(name.to_string()))?;
        Ok(constructor(executor))
    }
}
