//! Error types for the Dory library.
//!
//! All errors are represented by the [`DoryError`] enum. Client input
//! problems (unknown filter operators, malformed cursors) stay local to the
//! field resolution that produced them; deadline and backend transport
//! failures abort the whole top-level execution.
//!
//! # Examples
//!
//! ```
//! use dory::error::{DoryError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(DoryError::invalid_cursor("not base64"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use anyhow;
use thiserror::Error;

/// The main error type for Dory operations.
///
/// Uses the `thiserror` crate for automatic `Error` trait implementation and
/// provides convenient constructor methods for creating specific error types.
#[derive(Error, Debug)]
pub enum DoryError {
    /// A filter leaf used an operator the compiler does not know.
    #[error("unsupported filter operator `{operator}` on field `{field}`")]
    UnsupportedFilterOperator {
        /// Dotted path of the offending field.
        field: String,
        /// The operator name as supplied by the caller.
        operator: String,
    },

    /// A pagination cursor could not be decoded, or did not match the
    /// active sort spec.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A pagination argument had the wrong type or an out-of-range value.
    #[error("invalid pagination argument: {0}")]
    InvalidPageArgument(String),

    /// The total document count was accessed on a response that was built
    /// without requesting it.
    #[error("total document count was not requested for this query")]
    CountUnavailable,

    /// Aggregations were accessed on a response whose aggregations were
    /// invalidated, with the reason they became unavailable.
    #[error("aggregations unavailable: {0}")]
    AggregationsUnavailable(String),

    /// The execution deadline elapsed before the request completed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// A query details measurement violated an invariant (for example a
    /// negative transport duration).
    #[error("query details error: {0}")]
    Tracker(String),

    /// A relationship resolution strategy name had no registered
    /// constructor.
    #[error("unknown resolver strategy `{0}`")]
    UnknownResolver(String),

    /// Backend transport or protocol errors.
    #[error("backend error: {0}")]
    Backend(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with DoryError.
pub type Result<T> = std::result::Result<T, DoryError>;

impl DoryError {
    /// Create a new unsupported-filter-operator error.
    pub fn unsupported_operator<F: Into<String>, O: Into<String>>(field: F, operator: O) -> Self {
        DoryError::UnsupportedFilterOperator {
            field: field.into(),
            operator: operator.into(),
        }
    }

    /// Create a new invalid-cursor error.
    pub fn invalid_cursor<S: Into<String>>(msg: S) -> Self {
        DoryError::InvalidCursor(msg.into())
    }

    /// Create a new invalid-page-argument error.
    pub fn invalid_page_argument<S: Into<String>>(msg: S) -> Self {
        DoryError::InvalidPageArgument(msg.into())
    }

    /// Create a new aggregations-unavailable error.
    pub fn aggregations_unavailable<S: Into<String>>(reason: S) -> Self {
        DoryError::AggregationsUnavailable(reason.into())
    }

    /// Create a new deadline-exceeded error.
    pub fn deadline_exceeded<S: Into<String>>(msg: S) -> Self {
        DoryError::DeadlineExceeded(msg.into())
    }

    /// Create a new tracker error.
    pub fn tracker<S: Into<String>>(msg: S) -> Self {
        DoryError::Tracker(msg.into())
    }

    /// Create a new backend error.
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        DoryError::Backend(msg.into())
    }

    /// True for errors caused by client input rather than execution state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DoryError::UnsupportedFilterOperator { .. }
                | DoryError::InvalidCursor(_)
                | DoryError::InvalidPageArgument(_)
        )
    }
}
