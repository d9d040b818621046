//! In-memory search backend for integration tests.
//!
//! Interprets the subset of the backend body language that Dory emits:
//! `match_all`, `bool` (filter/should/must_not), `term`, `terms`,
//! `prefix`, `wildcard`, `range`, `exists`, plus `sort`, `search_after`,
//! `size`, and `track_total_hits`.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use futures::future::BoxFuture;
use serde_json::{Map, Value, json};

use dory::backend::{RawSearchResponse, SearchBackend};
use dory::cursor::{SortClause, SortSpec, compare_sort_values};
use dory::error::Result;

/// One indexed document.
#[derive(Debug, Clone)]
pub struct MockDoc {
    pub index: String,
    pub id: String,
    pub source: Map<String, Value>,
}

impl MockDoc {
    pub fn new(index: &str, id: &str, source: Value) -> Self {
        MockDoc {
            index: index.to_string(),
            id: id.to_string(),
            source: source.as_object().cloned().unwrap_or_default(),
        }
    }
}

/// An in-memory backend over a fixed document set.
pub struct MockBackend {
    docs: Vec<MockDoc>,
    requests: AtomicU64,
}

impl MockBackend {
    pub fn new(docs: Vec<MockDoc>) -> Self {
        MockBackend {
            docs,
            requests: AtomicU64::new(0),
        }
    }

    /// Number of search requests served so far.
    pub fn request_count(&self) -> u64 {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn run_search(&self, indices: &[String], body: &Value) -> RawSearchResponse {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);

        let query = body.get("query").cloned().unwrap_or(json!({"match_all": {}}));
        let mut matching: Vec<&MockDoc> = self
            .docs
            .iter()
            .filter(|doc| index_matches(indices, &doc.index) && eval_query(&query, doc))
            .collect();

        let spec = parse_sort(body.get("sort"));
        let mut keyed: Vec<(Vec<Value>, &MockDoc)> = matching
            .drain(..)
            .map(|doc| (sort_tuple(doc, &spec), doc))
            .collect();
        keyed.sort_by(|a, b| compare_sort_values(&a.0, &b.0, &spec));

        let total = keyed.len() as u64;

        if let Some(after) = body.get("search_after").and_then(Value::as_array) {
            keyed.retain(|(tuple, _)| compare_sort_values(tuple, after, &spec) == Ordering::Greater);
        }

        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        keyed.truncate(size);

        let hits: Vec<Value> = keyed
            .iter()
            .map(|(tuple, doc)| {
                json!({
                    "_id": doc.id,
                    "_index": doc.index,
                    "_source": doc.source,
                    "sort": tuple,
                })
            })
            .collect();

        let mut response = json!({
            "took": 1,
            "_shards": {"total": 1, "successful": 1},
            "hits": {"hits": hits}
        });
        if body
            .get("track_total_hits")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            response["hits"]["total"] = json!({"value": total, "relation": "eq"});
        }
        serde_json::from_value(response).unwrap()
    }
}

impl SearchBackend for MockBackend {
    fn search(
        &self,
        indices: Vec<String>,
        body: Value,
    ) -> BoxFuture<'_, Result<RawSearchResponse>> {
        let response = self.run_search(&indices, &body);
        Box::pin(async move { Ok(response) })
    }
}

fn index_matches(indices: &[String], doc_index: &str) -> bool {
    indices.iter().any(|expr| {
        expr == doc_index
            || expr
                .strip_suffix('*')
                .is_some_and(|prefix| doc_index.starts_with(prefix))
    })
}

fn parse_sort(sort: Option<&Value>) -> SortSpec {
    let mut spec = SortSpec::new();
    let Some(clauses) = sort.and_then(Value::as_array) else {
        return spec;
    };
    for clause in clauses {
        let Some(object) = clause.as_object() else {
            continue;
        };
        for (field, options) in object {
            let clause = match options.get("order").and_then(Value::as_str) {
                Some("desc") => SortClause::desc(field),
                _ => SortClause::asc(field),
            };
            spec = spec.then(clause);
        }
    }
    spec
}

fn sort_tuple(doc: &MockDoc, spec: &SortSpec) -> Vec<Value> {
    spec.clauses()
        .iter()
        .map(|clause| {
            field_values(doc, &clause.field)
                .into_iter()
                .next()
                .unwrap_or(Value::Null)
        })
        .collect()
}

fn field_values(doc: &MockDoc, field: &str) -> Vec<Value> {
    if field == "id" {
        return vec![Value::String(doc.id.clone())];
    }
    let mut out = Vec::new();
    collect(&Value::Object(doc.source.clone()), &field.split('.').collect::<Vec<_>>(), &mut out);
    out
}

fn collect(value: &Value, segments: &[&str], out: &mut Vec<Value>) {
    match segments.split_first() {
        None => match value {
            Value::Array(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        },
        Some((head, rest)) => match value {
            Value::Object(map) => {
                if let Some(next) = map.get(*head) {
                    collect(next, rest, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    collect(item, segments, out);
                }
            }
            _ => {}
        },
    }
}

fn eval_query(query: &Value, doc: &MockDoc) -> bool {
    let Some(object) = query.as_object() else {
        return false;
    };
    let Some((kind, body)) = object.iter().next() else {
        return false;
    };

    match kind.as_str() {
        "match_all" => true,
        "bool" => eval_bool(body, doc),
        "term" => single_entry(body)
            .map(|(field, value)| field_values(doc, &field).contains(value))
            .unwrap_or(false),
        "terms" => single_entry(body)
            .and_then(|(field, values)| {
                values.as_array().map(|allowed| {
                    field_values(doc, &field)
                        .iter()
                        .any(|v| allowed.contains(v))
                })
            })
            .unwrap_or(false),
        "prefix" => single_entry(body)
            .map(|(field, value)| {
                let prefix = value.as_str().unwrap_or_default();
                field_values(doc, &field)
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| s.starts_with(prefix)))
            })
            .unwrap_or(false),
        "wildcard" => single_entry(body)
            .map(|(field, value)| {
                let pattern = value.as_str().unwrap_or_default();
                let needle = pattern.trim_matches('*');
                field_values(doc, &field)
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| s.contains(needle)))
            })
            .unwrap_or(false),
        "range" => single_entry(body)
            .and_then(|(field, bounds)| {
                let bounds = bounds.as_object()?;
                let values = field_values(doc, &field);
                Some(values.iter().any(|v| {
                    bounds.iter().all(|(op, bound)| {
                        let ordering = compare_json(v, bound);
                        match op.as_str() {
                            "gt" => ordering == Ordering::Greater,
                            "gte" => ordering != Ordering::Less,
                            "lt" => ordering == Ordering::Less,
                            "lte" => ordering != Ordering::Greater,
                            _ => false,
                        }
                    })
                }))
            })
            .unwrap_or(false),
        "exists" => body
            .get("field")
            .and_then(Value::as_str)
            .map(|field| {
                field_values(doc, field)
                    .iter()
                    .any(|v| !v.is_null())
            })
            .unwrap_or(false),
        _ => false,
    }
}

fn eval_bool(body: &Value, doc: &MockDoc) -> bool {
    let filter_ok = body
        .get("filter")
        .and_then(Value::as_array)
        .map(|clauses| clauses.iter().all(|c| eval_query(c, doc)))
        .unwrap_or(true);
    let should_ok = body
        .get("should")
        .and_then(Value::as_array)
        .map(|clauses| clauses.is_empty() || clauses.iter().any(|c| eval_query(c, doc)))
        .unwrap_or(true);
    let must_not_ok = body
        .get("must_not")
        .and_then(Value::as_array)
        .map(|clauses| clauses.iter().all(|c| !eval_query(c, doc)))
        .unwrap_or(true);
    filter_ok && should_ok && must_not_ok
}

fn single_entry(body: &Value) -> Option<(String, &Value)> {
    let object = body.as_object()?;
    let (field, value) = object.iter().next()?;
    Some((field.clone(), value))
}

fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}
