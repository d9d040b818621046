//! Cursor-based pagination over sort-ordered result streams.
//!
//! Forward pagination (`first`, `after`) requests `first + 1` items after
//! the cursor so `has_next_page` is known without a second round trip;
//! backward pagination (`last`, `before`) is symmetric, with results
//! reversed back to ascending order before assembly. The extra item is
//! discarded before returning.
//!
//! The external argument names are configurable ([`PageArgNames`]) and
//! translated to canonical semantics at the boundary.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cursor::{self, Cursor, SortSpec};
use crate::error::{DoryError, Result};

/// Page size used when neither `first` nor `last` is given.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Externally visible names for the canonical pagination arguments.
#[derive(Debug, Clone)]
pub struct PageArgNames {
    /// Name of the forward page-size argument.
    pub first: String,
    /// Name of the forward cursor argument.
    pub after: String,
    /// Name of the backward page-size argument.
    pub last: String,
    /// Name of the backward cursor argument.
    pub before: String,
}

impl Default for PageArgNames {
    fn default() -> Self {
        PageArgNames {
            first: "first".to_string(),
            after: "after".to_string(),
            last: "last".to_string(),
            before: "before".to_string(),
        }
    }
}

/// Canonical pagination arguments for one field resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageArgs {
    /// Forward page size.
    pub first: Option<usize>,
    /// Forward cursor (encoded).
    pub after: Option<String>,
    /// Backward page size.
    pub last: Option<usize>,
    /// Backward cursor (encoded).
    pub before: Option<String>,
}

/// Direction a page window moves through the result stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    /// `first`/`after` semantics.
    Forward,
    /// `last`/`before` semantics.
    Backward,
}

impl PageArgs {
    /// Create forward page arguments.
    pub fn forward(first: usize, after: Option<String>) -> Self {
        PageArgs {
            first: Some(first),
            after,
            ..Default::default()
        }
    }

    /// Create backward page arguments.
    pub fn backward(last: usize, before: Option<String>) -> Self {
        PageArgs {
            last: Some(last),
            before,
            ..Default::default()
        }
    }

    /// Extract page arguments from a raw GraphQL argument map, translating
    /// the configured external names to canonical semantics.
    pub fn from_arguments(args: &Map<String, Value>, names: &PageArgNames) -> Result<Self> {
        fn size_arg(args: &Map<String, Value>, name: &str) -> Result<Option<usize>> {
            match args.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => value
                    .as_u64()
                    .map(|n| Some(n as usize))
                    .ok_or_else(|| {
                        DoryError::invalid_page_argument(format!(
                            "`{name}` must be a non-negative integer, got {value}"
                        ))
                    }),
            }
        }

        fn cursor_arg(args: &Map<String, Value>, name: &str) -> Result<Option<String>> {
            match args.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(other) => Err(DoryError::invalid_page_argument(format!(
                    "`{name}` must be a string cursor, got {other}"
                ))),
            }
        }

        Ok(PageArgs {
            first: size_arg(args, &names.first)?,
            after: cursor_arg(args, &names.after)?,
            last: size_arg(args, &names.last)?,
            before: cursor_arg(args, &names.before)?,
        })
    }

    /// The direction these arguments request.
    pub fn direction(&self) -> PageDirection {
        if self.last.is_some() || (self.before.is_some() && self.first.is_none()) {
            PageDirection::Backward
        } else {
            PageDirection::Forward
        }
    }

    /// The requested page size.
    pub fn limit(&self) -> usize {
        match self.direction() {
            PageDirection::Forward => self.first.unwrap_or(DEFAULT_PAGE_SIZE),
            PageDirection::Backward => self.last.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    /// Resolve these arguments into a page window, decoding the cursor
    /// against the active sort spec.
    pub fn window(&self, spec: &SortSpec) -> Result<PageWindow> {
        let direction = self.direction();
        let encoded = match direction {
            PageDirection::Forward => self.after.as_deref(),
            PageDirection::Backward => self.before.as_deref(),
        };
        let cursor = encoded.map(|s| cursor::decode(s, spec)).transpose()?;
        Ok(PageWindow {
            direction,
            limit: self.limit(),
            cursor,
        })
    }
}

/// A resolved page window: direction, size, and decoded boundary cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWindow {
    /// Paging direction.
    pub direction: PageDirection,
    /// Requested page size.
    pub limit: usize,
    /// Decoded boundary cursor, if one was supplied.
    pub cursor: Option<Cursor>,
}

impl PageWindow {
    /// A forward window over the first `limit` items.
    pub fn forward(limit: usize) -> Self {
        PageWindow {
            direction: PageDirection::Forward,
            limit,
            cursor: None,
        }
    }

    /// Items to request from the backend: one more than the page size, so
    /// the overflow item answers `has_next_page`.
    pub fn fetch_size(&self) -> usize {
        self.limit + 1
    }

    /// Items to request when one backend request serves `keys` distinct
    /// parent keys, so every derived per-parent page keeps its overflow
    /// item.
    pub fn fetch_size_for(&self, keys: usize) -> usize {
        self.fetch_size() * keys.max(1)
    }

    /// Whether this window is empty before any request is made: forward
    /// from the after-last sentinel, or backward from the before-first
    /// sentinel.
    pub fn known_empty(&self) -> bool {
        matches!(
            (self.direction, &self.cursor),
            (PageDirection::Forward, Some(Cursor::End))
                | (PageDirection::Backward, Some(Cursor::Start))
        )
    }

    /// The sort-key values to resume after, when the cursor points at an
    /// item.
    pub fn search_after(&self) -> Option<&[Value]> {
        match &self.cursor {
            Some(Cursor::At(keys)) => Some(keys),
            _ => None,
        }
    }
}

/// One page of items with its boundary flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The page items, in ascending sort order.
    pub items: Vec<T>,
    /// Whether an item exists after this page.
    pub has_next: bool,
    /// Whether an item exists before this page.
    pub has_previous: bool,
}

/// Compute a page from backend items fetched for `window`.
///
/// Forward items arrive in ascending order; backward items arrive in the
/// reversed order the backend returned them in and are restored to
/// ascending order here.
pub fn paginate<T>(mut items: Vec<T>, window: &PageWindow) -> Page<T> {
    let overflow = items.len() > window.limit;
    items.truncate(window.limit);

    match window.direction {
        PageDirection::Forward => Page {
            items,
            has_next: overflow,
            has_previous: matches!(window.cursor, Some(Cursor::At(_)) | Some(Cursor::End)),
        },
        PageDirection::Backward => {
            items.reverse();
            Page {
                items,
                has_next: matches!(window.cursor, Some(Cursor::At(_)) | Some(Cursor::Start)),
                has_previous: overflow,
            }
        }
    }
}

/// One edge of a connection: an item and the cursor that resumes at it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<T> {
    /// Cursor pointing at this node.
    pub cursor: String,
    /// The item.
    pub node: T,
}

/// Boundary metadata for a connection page.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PageInfo {
    /// Cursor of the first edge, if any.
    pub start_cursor: Option<String>,
    /// Cursor of the last edge, if any.
    pub end_cursor: Option<String>,
    /// Whether an item exists after this page.
    pub has_next_page: bool,
    /// Whether an item exists before this page.
    pub has_previous_page: bool,
}

/// The connection shape handed to relationship/connection consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection<T> {
    /// The page items.
    pub nodes: Vec<T>,
    /// The page items with their cursors.
    pub edges: Vec<Edge<T>>,
    /// Boundary metadata.
    pub page_info: PageInfo,
    /// Total matching documents, when it was requested.
    pub total_count: Option<u64>,
}

impl<T> Connection<T> {
    /// A connection with no items and no neighbors.
    pub fn empty() -> Self {
        Connection {
            nodes: Vec::new(),
            edges: Vec::new(),
            page_info: PageInfo::default(),
            total_count: None,
        }
    }
}
