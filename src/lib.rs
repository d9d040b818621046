//! # Dory
//!
//! A GraphQL-to-search query compilation and execution core for Rust.
//!
//! Dory compiles field-level query plans (derived from parsed GraphQL
//! selections) into structured requests against a document search backend,
//! executes them, and reassembles the results into the shape the caller's
//! query plan expects.
//!
//! ## Features
//!
//! - Recursive boolean filter compilation that preserves backend
//!   query-cacheability
//! - Stable cursor-based forward/backward pagination over sort-ordered
//!   result streams
//! - Multi-level aggregation bucket decoding with a deterministic,
//!   reversible bucket-path encoding
//! - Cross-type relationship resolution in per-parent or batched mode,
//!   with identical results in both
//! - Per-execution query details tracking across concurrent resolutions

pub mod aggregation;
pub mod backend;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod filter;
pub mod pagination;
pub mod plan;
pub mod request;
pub mod resolver;
pub mod response;
pub mod tracker;

pub use crate::error::{DoryError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
