//! Aggregation request building and bucket decoding.
//!
//! Multi-level groupings are rendered as nested backend aggregations whose
//! names are the dotted field-path encoding ([`FieldPath::key`]), which is
//! deterministic and reversible, so response buckets can be mapped back to
//! the grouping paths that produced them.
//!
//! Terms aggregations on boolean fields report `0`/`1` instead of
//! `false`/`true`; [`decode_bucket_value`] translates exactly those two
//! values for boolean-kind fields and passes everything else through. This
//! is pinned to the observed backend behavior, not a general
//! numeric-to-boolean rule.

use ahash::AHashMap;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{Value, json};

use crate::error::{DoryError, Result};
use crate::plan::{DecodeContext, FieldKind, FieldPath};

/// A multi-level aggregation grouping spec, outermost level first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationsSpec {
    levels: Vec<FieldPath>,
}

impl AggregationsSpec {
    /// Create a spec from grouping paths, outermost first.
    pub fn new(levels: Vec<FieldPath>) -> Self {
        AggregationsSpec { levels }
    }

    /// Whether the spec has no grouping levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The grouping paths, outermost first.
    pub fn levels(&self) -> &[FieldPath] {
        &self.levels
    }

    /// Render the spec as a backend `aggs` body.
    ///
    /// Scalar levels become terms aggregations; object-kind levels become
    /// nested aggregations that scope the levels inside them.
    pub fn to_body(&self, ctx: &DecodeContext) -> Value {
        let mut body = json!({});
        for level in self.levels.iter().rev() {
            let key = level.key();
            let mut node = if ctx.kind(&key) == Some(FieldKind::Object) {
                json!({"nested": {"path": key.clone()}})
            } else {
                json!({"terms": {"field": key.clone()}})
            };
            if body.as_object().is_some_and(|m| !m.is_empty()) {
                node["aggs"] = body;
            }
            body = json!({key: node});
        }
        body
    }
}

/// A decoded aggregation bucket.
///
/// The key map accumulates `field-path encoding -> decoded value` entries
/// for this bucket's level and every level above it, so a leaf bucket fully
/// identifies its group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationBucket {
    /// Accumulated grouping keys for this bucket.
    pub key: AHashMap<String, Value>,
    /// Number of documents in this bucket.
    pub doc_count: u64,
    /// Buckets of the next grouping level.
    pub buckets: Vec<AggregationBucket>,
}

/// Decode a raw backend `aggregations` object into typed buckets.
pub fn decode_aggregations(
    raw: &Value,
    levels: &[FieldPath],
    ctx: &DecodeContext,
) -> Result<Vec<AggregationBucket>> {
    decode_levels(raw, levels, ctx, &AHashMap::new())
}

fn decode_levels(
    container: &Value,
    levels: &[FieldPath],
    ctx: &DecodeContext,
    inherited: &AHashMap<String, Value>,
) -> Result<Vec<AggregationBucket>> {
    let Some((level, rest)) = levels.split_first() else {
        return Ok(Vec::new());
    };
    let key = level.key();
    let node = container.get(&key).ok_or_else(|| {
        DoryError::backend(format!("response is missing aggregation container `{key}`"))
    })?;

    // An object-kind grouping segment has no leaf value of its own: its
    // sub-levels resolve inside the nested container.
    if ctx.kind(&key) == Some(FieldKind::Object) {
        return decode_levels(node, rest, ctx, inherited);
    }

    let raw_buckets = node
        .get("buckets")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            DoryError::backend(format!("aggregation container `{key}` has no buckets"))
        })?;

    let mut buckets = Vec::with_capacity(raw_buckets.len());
    for raw_bucket in raw_buckets {
        let raw_key = raw_bucket.get("key").unwrap_or(&Value::Null);
        let mut bucket_key = inherited.clone();
        bucket_key.insert(key.clone(), decode_bucket_value(raw_key, &key, ctx));

        let sub_buckets = if rest.is_empty() {
            Vec::new()
        } else {
            decode_levels(raw_bucket, rest, ctx, &bucket_key)?
        };

        buckets.push(AggregationBucket {
            key: bucket_key,
            doc_count: raw_bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
            buckets: sub_buckets,
        });
    }
    Ok(buckets)
}

/// Decode one raw bucket key for the field at `path_key`.
///
/// Datetime-kind fields come back as epoch-millisecond integer keys and are
/// rendered as RFC 3339 UTC strings.
pub fn decode_bucket_value(raw: &Value, path_key: &str, ctx: &DecodeContext) -> Value {
    match ctx.kind(path_key) {
        Some(FieldKind::Boolean) => match raw.as_i64() {
            Some(0) => return Value::Bool(false),
            Some(1) => return Value::Bool(true),
            _ => {}
        },
        Some(FieldKind::DateTime) => {
            if let Some(dt) = raw.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
                return Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true));
            }
        }
        _ => {}
    }
    raw.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DecodeContext {
        DecodeContext::new()
            .with_field("in_stock", FieldKind::Boolean)
            .with_field("author", FieldKind::Object)
            .with_field("author.city", FieldKind::Text)
            .with_field("category", FieldKind::Text)
            .with_field("published_at", FieldKind::DateTime)
    }

    #[test]
    fn test_spec_body_nests_levels() {
        let spec = AggregationsSpec::new(vec![
            FieldPath::root("category"),
            FieldPath::root("in_stock"),
        ]);
        assert_eq!(
            spec.to_body(&ctx()),
            json!({
                "category": {
                    "terms": {"field": "category"},
                    "aggs": {
                        "in_stock": {"terms": {"field": "in_stock"}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_spec_body_object_level_uses_nested() {
        let spec = AggregationsSpec::new(vec![
            FieldPath::root("author"),
            FieldPath::new(vec!["author", "city"]),
        ]);
        assert_eq!(
            spec.to_body(&ctx()),
            json!({
                "author": {
                    "nested": {"path": "author"},
                    "aggs": {
                        "author.city": {"terms": {"field": "author.city"}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_decode_two_levels_accumulates_keys() {
        let raw = json!({
            "category": {
                "buckets": [
                    {
                        "key": "books",
                        "doc_count": 7,
                        "in_stock": {
                            "buckets": [
                                {"key": 1, "doc_count": 4},
                                {"key": 0, "doc_count": 3}
                            ]
                        }
                    }
                ]
            }
        });
        let levels = vec![FieldPath::root("category"), FieldPath::root("in_stock")];
        let buckets = decode_aggregations(&raw, &levels, &ctx()).unwrap();

        assert_eq!(buckets.len(), 1);
        let outer = &buckets[0];
        assert_eq!(outer.key.get("category"), Some(&json!("books")));
        assert_eq!(outer.doc_count, 7);
        assert_eq!(outer.buckets.len(), 2);

        let inner = &outer.buckets[0];
        // Leaf buckets carry the full grouping key.
        assert_eq!(inner.key.get("category"), Some(&json!("books")));
        assert_eq!(inner.key.get("in_stock"), Some(&json!(true)));
        assert_eq!(inner.doc_count, 4);
    }

    #[test]
    fn test_object_level_recurses_into_sub_buckets() {
        let raw = json!({
            "author": {
                "doc_count": 12,
                "author.city": {
                    "buckets": [
                        {"key": "Osaka", "doc_count": 8},
                        {"key": "Kyoto", "doc_count": 4}
                    ]
                }
            }
        });
        let levels = vec![
            FieldPath::root("author"),
            FieldPath::new(vec!["author", "city"]),
        ];
        let buckets = decode_aggregations(&raw, &levels, &ctx()).unwrap();

        // The object level contributes no key entry of its own.
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key.get("author"), None);
        assert_eq!(buckets[0].key.get("author.city"), Some(&json!("Osaka")));
        assert_eq!(buckets[0].doc_count, 8);
    }

    // Pinned compatibility behavior: the backend reports boolean terms as
    // 0/1, and only exactly those values translate.
    #[test]
    fn test_pinned_boolean_bucket_decode() {
        let c = ctx();
        assert_eq!(
            decode_bucket_value(&json!(0), "in_stock", &c),
            Value::Bool(false)
        );
        assert_eq!(
            decode_bucket_value(&json!(1), "in_stock", &c),
            Value::Bool(true)
        );
        // Other raw values on a boolean field pass through unchanged.
        assert_eq!(decode_bucket_value(&json!(2), "in_stock", &c), json!(2));
        assert_eq!(decode_bucket_value(&json!("1"), "in_stock", &c), json!("1"));
        // Non-boolean fields never translate.
        assert_eq!(decode_bucket_value(&json!(0), "category", &c), json!(0));
        assert_eq!(decode_bucket_value(&json!(1), "price", &c), json!(1));
    }

    #[test]
    fn test_datetime_bucket_decode() {
        let c = ctx();
        // 2024-03-01T00:00:00Z in epoch milliseconds.
        assert_eq!(
            decode_bucket_value(&json!(1709251200000i64), "published_at", &c),
            json!("2024-03-01T00:00:00.000Z")
        );
        // Non-integer keys pass through unchanged.
        assert_eq!(
            decode_bucket_value(&json!("2024-03-01"), "published_at", &c),
            json!("2024-03-01")
        );
    }

    #[test]
    fn test_missing_container_is_an_error() {
        let raw = json!({});
        let levels = vec![FieldPath::root("category")];
        let err = decode_aggregations(&raw, &levels, &ctx()).unwrap_err();
        assert!(matches!(err, DoryError::Backend(_)));
    }
}
