//! Opaque pagination cursors and sort specifications.
//!
//! A cursor encodes the tuple of sort-key values observed at a page
//! boundary, versioned and base64-wrapped so callers treat it as opaque.
//! Decoding never fails silently: a malformed or stale cursor is an
//! [`InvalidCursor`](crate::error::DoryError::InvalidCursor) error, not
//! "no cursor". Distinguished sentinels mark the positions before the first
//! and after the last item.
//!
//! Encoding is stable across processes: the envelope is a struct with named
//! fields serialized in declaration order, with no map iteration involved.

use std::cmp::Ordering;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DoryError, Result};

/// Sort order for a sort clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order (lowest to highest).
    Asc,
    /// Descending order (highest to lowest).
    Desc,
}

impl SortOrder {
    /// The backend name of this order.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    /// The opposite order.
    pub fn reversed(&self) -> SortOrder {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// One sort clause: a field and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    /// Field to sort by.
    pub field: String,
    /// Sort order.
    pub order: SortOrder,
}

impl SortClause {
    /// Create a sort clause.
    pub fn new<S: Into<String>>(field: S, order: SortOrder) -> Self {
        SortClause {
            field: field.into(),
            order,
        }
    }

    /// Create an ascending clause.
    pub fn asc<S: Into<String>>(field: S) -> Self {
        SortClause::new(field, SortOrder::Asc)
    }

    /// Create a descending clause.
    pub fn desc<S: Into<String>>(field: S) -> Self {
        SortClause::new(field, SortOrder::Desc)
    }
}

/// An ordered list of sort clauses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    clauses: Vec<SortClause>,
}

impl SortSpec {
    /// Create an empty sort spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sort spec from clauses.
    pub fn from_clauses(clauses: Vec<SortClause>) -> Self {
        SortSpec { clauses }
    }

    /// Append a clause.
    pub fn then(mut self, clause: SortClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Append an ascending clause on the backend identity field unless one
    /// on that field is already present.
    ///
    /// Cursor paging over items with identical sort-key values is only
    /// well-defined with a deterministic tie-break; every sort spec gets
    /// one before it is used for a request.
    pub fn ensure_tie_break<S: Into<String>>(mut self, id_field: S) -> Self {
        let id_field = id_field.into();
        if !self.clauses.iter().any(|c| c.field == id_field) {
            self.clauses.push(SortClause::asc(id_field));
        }
        self
    }

    /// The clauses in order.
    pub fn clauses(&self) -> &[SortClause] {
        &self.clauses
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the spec has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// A spec with every clause direction flipped, for backward paging.
    pub fn reversed(&self) -> SortSpec {
        SortSpec {
            clauses: self
                .clauses
                .iter()
                .map(|c| SortClause::new(c.field.clone(), c.order.reversed()))
                .collect(),
        }
    }

    /// Render the spec as a backend sort body.
    pub fn to_body(&self) -> Value {
        Value::Array(
            self.clauses
                .iter()
                .map(|c| serde_json::json!({&c.field: {"order": c.order.as_str()}}))
                .collect(),
        )
    }
}

/// Current cursor envelope version.
const CURSOR_VERSION: u32 = 1;

/// A decoded pagination cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    /// The position before the first item.
    Start,
    /// The position after the last item.
    End,
    /// The position at the item carrying these sort-key values, one value
    /// per active sort clause.
    At(Vec<Value>),
}

/// Wire form of a cursor. Field order is the serialization order.
#[derive(Debug, Serialize, Deserialize)]
struct CursorEnvelope {
    v: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keys: Option<Vec<Value>>,
}

/// Encode a cursor against the active sort spec.
pub fn encode(cursor: &Cursor, spec: &SortSpec) -> Result<String> {
    let envelope = match cursor {
        Cursor::Start => CursorEnvelope {
            v: CURSOR_VERSION,
            pos: Some("start".to_string()),
            keys: None,
        },
        Cursor::End => CursorEnvelope {
            v: CURSOR_VERSION,
            pos: Some("end".to_string()),
            keys: None,
        },
        Cursor::At(keys) => {
            if keys.len() != spec.len() {
                return Err(DoryError::invalid_cursor(format!(
                    "sort key arity {} does not match sort spec arity {}",
                    keys.len(),
                    spec.len()
                )));
            }
            CursorEnvelope {
                v: CURSOR_VERSION,
                pos: None,
                keys: Some(keys.clone()),
            }
        }
    };
    let bytes = serde_json::to_vec(&envelope)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a cursor, validating it against the active sort spec.
///
/// A cursor produced under an incompatible sort spec (wrong arity) fails
/// here; it is never interpreted as a valid but wrong position.
pub fn decode(encoded: &str, spec: &SortSpec) -> Result<Cursor> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| DoryError::invalid_cursor(format!("not valid base64: {e}")))?;
    let envelope: CursorEnvelope = serde_json::from_slice(&bytes)
        .map_err(|e| DoryError::invalid_cursor(format!("malformed envelope: {e}")))?;

    if envelope.v != CURSOR_VERSION {
        return Err(DoryError::invalid_cursor(format!(
            "unsupported cursor version {}",
            envelope.v
        )));
    }

    match (envelope.pos.as_deref(), envelope.keys) {
        (Some("start"), None) => Ok(Cursor::Start),
        (Some("end"), None) => Ok(Cursor::End),
        (None, Some(keys)) => {
            if keys.len() != spec.len() {
                return Err(DoryError::invalid_cursor(format!(
                    "cursor carries {} sort keys but the sort spec has {} clauses",
                    keys.len(),
                    spec.len()
                )));
            }
            Ok(Cursor::At(keys))
        }
        (Some(other), _) => Err(DoryError::invalid_cursor(format!(
            "unknown cursor position `{other}`"
        ))),
        (None, None) => Err(DoryError::invalid_cursor(
            "cursor carries neither a position nor sort keys",
        )),
    }
}

/// Compare two sort-key tuples under a sort spec.
///
/// Per-clause directions are folded in here, so callers get uniform
/// ascending semantics regardless of how individual fields are ordered.
pub fn compare_sort_values(a: &[Value], b: &[Value], spec: &SortSpec) -> Ordering {
    for (i, clause) in spec.clauses().iter().enumerate() {
        let (va, vb) = match (a.get(i), b.get(i)) {
            (Some(va), Some(vb)) => (va, vb),
            _ => return a.len().cmp(&b.len()),
        };
        let ordering = match clause.order {
            SortOrder::Asc => compare_raw(va, vb),
            SortOrder::Desc => compare_raw(va, vb).reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Natural ordering over raw JSON sort values. Values of different JSON
/// kinds order by kind rank, nulls first.
fn compare_raw(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}
