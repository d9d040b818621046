//! Inbound query-plan types supplied by the GraphQL execution layer.
//!
//! A [`FieldPlan`] describes one resolved GraphQL field: which sub-fields
//! were selected, the filter expression, pagination and sort arguments, and
//! aggregation groupings. The [`DecodeContext`] carries the type metadata
//! needed to decode backend responses back into externally visible values.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::cursor::SortSpec;
use crate::filter::FilterExpression;
use crate::pagination::PageArgs;
use crate::request::HighlightSpec;

/// Separator used for the dotted form of a field path.
///
/// GraphQL names cannot contain `.`, which keeps the dotted form reversible.
pub const FIELD_PATH_SEPARATOR: &str = ".";

/// A path of field names from a document root to a (possibly nested) field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Create a field path from its segments.
    pub fn new<S: Into<String>>(segments: Vec<S>) -> Self {
        FieldPath(segments.into_iter().map(Into::into).collect())
    }

    /// Create a single-segment path.
    pub fn root<S: Into<String>>(name: S) -> Self {
        FieldPath(vec![name.into()])
    }

    /// Parse a path from its dotted form.
    pub fn from_key(key: &str) -> Self {
        FieldPath(
            key.split(FIELD_PATH_SEPARATOR)
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// The dotted form of this path. A path of N names maps to exactly one
    /// key, and the mapping is reversible via [`FieldPath::from_key`].
    pub fn key(&self) -> String {
        self.0.join(FIELD_PATH_SEPARATOR)
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments in this path.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Create a child path by appending a segment.
    pub fn child<S: Into<String>>(&self, segment: S) -> FieldPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        FieldPath(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The kind of value a document field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Analyzed or keyword text.
    Text,
    /// i64 integer values.
    Integer,
    /// f64 floating-point values.
    Float,
    /// true/false values.
    Boolean,
    /// UTC timestamps.
    DateTime,
    /// A nested object with fields of its own.
    Object,
}

/// Type metadata used when decoding backend responses.
///
/// Maps dotted field paths to their kinds (the aggregation decoder needs to
/// know which fields are boolean- or object-kind) and internal highlight
/// field names to the externally visible names they surface as.
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    field_kinds: AHashMap<String, FieldKind>,
    highlight_names: AHashMap<String, Vec<String>>,
    id_field: Option<String>,
}

/// Default externally visible identity field name.
pub const DEFAULT_ID_FIELD: &str = "id";

impl DecodeContext {
    /// Create an empty decode context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the kind of a field.
    pub fn with_field<S: Into<String>>(mut self, key: S, kind: FieldKind) -> Self {
        self.field_kinds.insert(key.into(), kind);
        self
    }

    /// Register the external names an internal highlight field maps to.
    ///
    /// A single internal name may map to zero, one, or multiple external
    /// names.
    pub fn with_highlight_names<S: Into<String>>(
        mut self,
        internal: S,
        externals: Vec<String>,
    ) -> Self {
        self.highlight_names.insert(internal.into(), externals);
        self
    }

    /// Override the externally visible identity field name.
    pub fn with_id_field<S: Into<String>>(mut self, id_field: S) -> Self {
        self.id_field = Some(id_field.into());
        self
    }

    /// Look up the kind of a field by its dotted path.
    pub fn kind(&self, key: &str) -> Option<FieldKind> {
        self.field_kinds.get(key).copied()
    }

    /// The external highlight names for an internal field name, if mapped.
    pub fn external_highlight_names(&self, internal: &str) -> Option<&[String]> {
        self.highlight_names.get(internal).map(|v| v.as_slice())
    }

    /// The externally visible identity field name.
    pub fn id_field(&self) -> &str {
        self.id_field.as_deref().unwrap_or(DEFAULT_ID_FIELD)
    }
}

/// A field-level query plan derived from a parsed GraphQL selection.
#[derive(Debug, Clone, Default)]
pub struct FieldPlan {
    /// The resolved field's name.
    pub field_name: String,
    /// Sub-fields actually selected (or needed for derived fields).
    pub selections: Vec<FieldPath>,
    /// Request every source field, ignoring `selections`. Used when the
    /// full document is needed, e.g. federation-style entity lookups.
    pub all_fields: bool,
    /// Filter expression from the field arguments.
    pub filter: Option<FilterExpression>,
    /// Pagination arguments, already translated to canonical names.
    pub page: PageArgs,
    /// Sort clauses from the field arguments.
    pub sort: SortSpec,
    /// Multi-level aggregation grouping paths, outermost first.
    pub group_by: Vec<FieldPath>,
    /// Highlight targets.
    pub highlight: HighlightSpec,
    /// Whether the caller will read the total document count.
    pub total_count_needed: bool,
}

impl FieldPlan {
    /// Create a plan for a named field with everything else defaulted.
    pub fn new<S: Into<String>>(field_name: S) -> Self {
        FieldPlan {
            field_name: field_name.into(),
            ..Default::default()
        }
    }

    /// Add a selected sub-field.
    pub fn select(mut self, path: FieldPath) -> Self {
        self.selections.push(path);
        self
    }

    /// Request all source fields.
    pub fn all_fields(mut self) -> Self {
        self.all_fields = true;
        self
    }

    /// Set the filter expression.
    pub fn filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the pagination arguments.
    pub fn page(mut self, page: PageArgs) -> Self {
        self.page = page;
        self
    }

    /// Set the sort spec.
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    /// Add an aggregation grouping level.
    pub fn group_by(mut self, path: FieldPath) -> Self {
        self.group_by.push(path);
        self
    }

    /// Set the highlight spec.
    pub fn highlight(mut self, highlight: HighlightSpec) -> Self {
        self.highlight = highlight;
        self
    }

    /// Declare that the caller will read the total document count.
    pub fn with_total_count(mut self) -> Self {
        self.total_count_needed = true;
        self
    }
}
