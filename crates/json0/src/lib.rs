//! Path-addressed operation protocol for shared JSON documents.
//!
//! This crate defines the operation format shared by every consumer of a
//! replicated document: notebook structural/content sync, append-only
//! message logs, and per-cell auxiliary state. An [`Operation`] addresses a
//! location in the document tree with a [`Path`] of string keys and list
//! indices, and carries exactly one mutation:
//!
//! - [`Operation::ListInsert`] — insert before the index named by the final
//!   path segment (wire `{p, li}`)
//! - [`Operation::ListDelete`] — remove at that index (wire `{p, ld}`)
//! - [`Operation::ListReplace`] — atomic whole-element replacement at the
//!   same index (wire `{p, ld, li}`)
//! - [`Operation::ObjReplace`] — field-level replace, final segment names
//!   the field (wire `{p, od, oi}`)
//!
//! Producers construct variants directly; the wire shape is an encoding
//! detail. [`Operation::from_wire`] is the lenient boundary decoder for
//! already-persisted documents whose operations arrive as raw JSON records.
//!
//! [`apply_op`] applies an operation to a `serde_json::Value` tree, for
//! brokers that materialize the document locally.

pub mod apply;
pub mod op;
pub mod path;

pub use apply::{apply_op, value_at};
pub use op::Operation;
pub use path::{Path, PathSegment};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpError {
    #[error("malformed operation: {0}")]
    Malformed(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("type mismatch at {0}")]
    TypeMismatch(String),

    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OpError>;
