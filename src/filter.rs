//! Filter expression compilation into backend boolean-query clauses.
//!
//! A [`FilterExpression`] is a tagged tree of leaf comparisons and the
//! combinators `And`, `Or`, and `Not`. [`compile`] turns it into a
//! [`CompiledBooleanQuery`]: an ordered list of backend clause objects under
//! a single occurrence bucket, ready to be merged into a parent boolean
//! node.
//!
//! Compilation is a pure function over the input tree. An `Or` of exactly
//! one child compiles to that child directly: the backend caches
//! must-all-match clauses but generally not any-of clauses, so keeping a
//! single-alternative filter in the must bucket preserves cacheability.

use serde_json::{Value, json};

use crate::error::{DoryError, Result};
use crate::plan::FieldPath;

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// Every clause must match (equivalent to AND).
    Must,
    /// At least one clause should match (equivalent to OR).
    Should,
    /// No clause may match (equivalent to NOT).
    MustNot,
}

impl Occur {
    /// The backend boolean-query bucket this occurrence maps to.
    pub fn bucket(&self) -> &'static str {
        match self {
            Occur::Must => "filter",
            Occur::Should => "should",
            Occur::MustNot => "must_not",
        }
    }
}

/// A recursive boolean filter expression over document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// A leaf comparison: `field path -> operator -> value(s)`.
    Compare {
        /// Path of the field being compared.
        field: FieldPath,
        /// Operator name as supplied by the caller (`eq`, `in`, ...).
        operator: String,
        /// Comparison value, or array of values for set operators.
        value: Value,
    },
    /// All children must match.
    And(Vec<FilterExpression>),
    /// At least one child must match.
    Or(Vec<FilterExpression>),
    /// The child must not match.
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    /// Create a leaf comparison.
    pub fn compare<O: Into<String>>(field: FieldPath, operator: O, value: Value) -> Self {
        FilterExpression::Compare {
            field,
            operator: operator.into(),
            value,
        }
    }

    /// Create an equality comparison.
    pub fn eq(field: FieldPath, value: Value) -> Self {
        Self::compare(field, "eq", value)
    }

    /// Create a set-membership comparison.
    pub fn any_of(field: FieldPath, values: Vec<Value>) -> Self {
        Self::compare(field, "in", Value::Array(values))
    }

    /// Create a prefix comparison.
    pub fn starts_with<S: Into<String>>(field: FieldPath, prefix: S) -> Self {
        Self::compare(field, "prefix", Value::String(prefix.into()))
    }

    /// Create a substring comparison.
    pub fn contains<S: Into<String>>(field: FieldPath, needle: S) -> Self {
        Self::compare(field, "contains", Value::String(needle.into()))
    }

    /// Create a null check. `is_null = false` matches documents where the
    /// field is present.
    pub fn is_null(field: FieldPath, is_null: bool) -> Self {
        Self::compare(field, "is_null", Value::Bool(is_null))
    }
}

/// The compiled form of a filter expression: backend clause objects under a
/// single occurrence bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBooleanQuery {
    /// The bucket these clauses belong in.
    pub occur: Occur,
    /// Ordered list of opaque backend clause objects.
    pub clauses: Vec<Value>,
}

impl CompiledBooleanQuery {
    /// Create a compiled query.
    pub fn new(occur: Occur, clauses: Vec<Value>) -> Self {
        CompiledBooleanQuery { occur, clauses }
    }

    /// A compiled query with no clauses, matching everything.
    pub fn match_all() -> Self {
        CompiledBooleanQuery::new(Occur::Must, Vec::new())
    }

    /// A compiled query matching no documents in any non-empty index.
    pub fn match_none() -> Self {
        CompiledBooleanQuery::new(
            Occur::Must,
            vec![json!({"bool": {"must_not": [{"match_all": {}}]}})],
        )
    }

    /// Whether this query has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Collapse this query into a single backend clause object.
    ///
    /// A single must clause is returned as-is rather than wrapped, so that
    /// the backend still sees a cacheable single-clause filter.
    pub fn into_clause(self) -> Value {
        if self.occur == Occur::Must && self.clauses.len() == 1 {
            self.clauses.into_iter().next().unwrap()
        } else {
            json!({"bool": {self.occur.bucket(): self.clauses}})
        }
    }

    /// Render this query as a complete backend boolean-query node.
    pub fn to_query(&self) -> Value {
        if self.clauses.is_empty() {
            json!({"match_all": {}})
        } else {
            json!({"bool": {self.occur.bucket(): self.clauses}})
        }
    }

    /// Combine two compiled queries so both must match.
    pub fn and(self, other: CompiledBooleanQuery) -> CompiledBooleanQuery {
        let mut clauses = Vec::new();
        for part in [self, other] {
            if part.is_empty() {
                continue;
            }
            if part.occur == Occur::Must {
                clauses.extend(part.clauses);
            } else {
                clauses.push(part.into_clause());
            }
        }
        CompiledBooleanQuery::new(Occur::Must, clauses)
    }
}

/// Compile a filter expression into backend boolean-query clauses.
pub fn compile(expr: &FilterExpression) -> Result<CompiledBooleanQuery> {
    match expr {
        FilterExpression::Compare {
            field,
            operator,
            value,
        } => {
            let clause = compile_comparison(field, operator, value)?;
            Ok(CompiledBooleanQuery::new(Occur::Must, vec![clause]))
        }
        FilterExpression::And(children) => {
            let mut clauses = Vec::new();
            for child in children {
                let compiled = compile(child)?;
                // Nested must clauses flatten into the parent bucket. Pure
                // normalization, no semantic effect.
                if compiled.occur == Occur::Must {
                    clauses.extend(compiled.clauses);
                } else {
                    clauses.push(compiled.into_clause());
                }
            }
            Ok(CompiledBooleanQuery::new(Occur::Must, clauses))
        }
        FilterExpression::Or(children) => match children.len() {
            // None of an empty set of alternatives is false by definition.
            0 => Ok(CompiledBooleanQuery::match_none()),
            // A single alternative is that alternative. Required: it keeps
            // the clause in the cacheable must bucket.
            1 => compile(&children[0]),
            _ => {
                let mut clauses = Vec::new();
                for child in children {
                    clauses.push(compile(child)?.into_clause());
                }
                Ok(CompiledBooleanQuery::new(Occur::Should, clauses))
            }
        },
        FilterExpression::Not(child) => {
            let compiled = compile(child)?;
            Ok(CompiledBooleanQuery::new(
                Occur::MustNot,
                vec![compiled.into_clause()],
            ))
        }
    }
}

/// Compile one leaf comparison to its backend clause.
fn compile_comparison(field: &FieldPath, operator: &str, value: &Value) -> Result<Value> {
    let key = field.key();
    let clause = match operator {
        "eq" => json!({"term": {key: value}}),
        "in" => json!({"terms": {key: value}}),
        "prefix" => json!({"prefix": {key: value}}),
        "contains" => {
            let needle = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({"wildcard": {key: format!("*{needle}*")}})
        }
        "gt" | "gte" | "lt" | "lte" => json!({"range": {key: {operator: value}}}),
        "is_null" => {
            let exists = json!({"exists": {"field": key}});
            if value.as_bool().unwrap_or(true) {
                json!({"bool": {"must_not": [exists]}})
            } else {
                exists
            }
        }
        other => {
            return Err(DoryError::unsupported_operator(key, other));
        }
    };
    Ok(clause)
}
