//! Shared-document model: schema keys, path builders, cell state, and the
//! broker-side collaborator contract.

use std::fmt;

use json0::{Operation, Path, PathSegment};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// Shared-document schema keys for notebook structure.
pub mod keys {
    pub const NOTEBOOK: &str = "notebook";
    pub const CELLS: &str = "cells";

    // Cell fields
    pub const ID: &str = "id";
    pub const CELL_TYPE: &str = "cell_type";
    pub const SOURCE: &str = "source";
    pub const OUTPUTS: &str = "outputs";
    pub const EXECUTION_COUNT: &str = "execution_count";
    pub const METADATA: &str = "metadata";
    pub const ANNOTATION: &str = "annotation";
}

/// Path builders for the locations the engine addresses.
pub mod paths {
    use super::keys;
    use json0::Path;

    /// `[notebook, cells]` — the cell list itself.
    pub fn cells() -> Path {
        vec![keys::NOTEBOOK.into(), keys::CELLS.into()]
    }

    /// `[notebook, cells, index]` — one cell.
    pub fn cell(index: usize) -> Path {
        vec![keys::NOTEBOOK.into(), keys::CELLS.into(), index.into()]
    }

    /// `[notebook, cells, index, execution_count]`.
    pub fn execution_count(index: usize) -> Path {
        let mut p = cell(index);
        p.push(keys::EXECUTION_COUNT.into());
        p
    }

    /// `[notebook, cells, index, outputs]`.
    pub fn outputs(index: usize) -> Path {
        let mut p = cell(index);
        p.push(keys::OUTPUTS.into());
        p
    }

    /// `[notebook, cells, index, metadata, field]` — per-cell auxiliary state.
    pub fn metadata_field(index: usize, field: &str) -> Path {
        let mut p = cell(index);
        p.push(keys::METADATA.into());
        p.push(field.into());
        p
    }
}

/// Cell kind constants matching nbformat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

impl CellKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Code => "code",
            CellKind::Markdown => "markdown",
            CellKind::Raw => "raw",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reserved pending sentinel: a guest's execution request surfaces as
/// this marker until the host runs the cell and emits the real count.
pub const PENDING_SENTINEL: &str = "*";

/// A cell's displayed execution count.
///
/// Wire form: JSON `null` (absent), the string `"*"` (pending), or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionCount {
    #[default]
    Absent,
    Pending,
    Done(i64),
}

impl ExecutionCount {
    pub fn is_pending(&self) -> bool {
        matches!(self, ExecutionCount::Pending)
    }
}

impl Serialize for ExecutionCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ExecutionCount::Absent => serializer.serialize_none(),
            ExecutionCount::Pending => serializer.serialize_str(PENDING_SENTINEL),
            ExecutionCount::Done(n) => serializer.serialize_i64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for ExecutionCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CountVisitor;

        impl Visitor<'_> for CountVisitor {
            type Value = ExecutionCount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("null, \"*\", or an integer")
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<ExecutionCount, E> {
                Ok(ExecutionCount::Absent)
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<ExecutionCount, E> {
                Ok(ExecutionCount::Absent)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ExecutionCount, E> {
                if v == PENDING_SENTINEL {
                    Ok(ExecutionCount::Pending)
                } else {
                    Err(E::custom(format!("unrecognized execution count: {:?}", v)))
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<ExecutionCount, E> {
                Ok(ExecutionCount::Done(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<ExecutionCount, E> {
                Ok(ExecutionCount::Done(v as i64))
            }
        }

        deserializer.deserialize_any(CountVisitor)
    }
}

fn empty_metadata() -> Value {
    Value::Object(serde_json::Map::new())
}

fn new_cell_id() -> String {
    Uuid::new_v4().to_string()
}

/// A snapshot of one cell, as replicated through the shared document.
///
/// Outputs are opaque JSON items; their order is externally observable and
/// must be preserved exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    #[serde(default = "new_cell_id")]
    pub id: String,
    #[serde(rename = "cell_type")]
    pub kind: CellKind,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub outputs: Vec<Value>,
    #[serde(default)]
    pub execution_count: ExecutionCount,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

impl CellState {
    pub fn new(kind: CellKind) -> Self {
        Self {
            id: new_cell_id(),
            kind,
            source: String::new(),
            outputs: Vec::new(),
            execution_count: ExecutionCount::Absent,
            metadata: empty_metadata(),
        }
    }

    pub fn code(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::new(CellKind::Code)
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::new(CellKind::Markdown)
        }
    }
}

/// Identifies which session submitted a batch of operations. A binding
/// ignores batches tagged with its own origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginTag(String);

impl OriginTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of event delivered by the shared-document broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocEventKind {
    /// A batch of operations was applied to the document.
    Op,
    /// The document was (re)loaded wholesale.
    Load,
}

/// One event from the shared document's stream: `(kind, operations, origin)`.
#[derive(Debug, Clone)]
pub struct DocEvent {
    pub kind: DocEventKind,
    pub ops: Vec<Operation>,
    pub origin: OriginTag,
}

/// A scoped handle for a sub-tree of the shared document. Sub-document
/// identity is path-derived: rebinding to a new path yields a different
/// handle even when the underlying content has not moved.
pub trait SubDoc {
    /// The path this handle is rooted at.
    fn path(&self) -> &[PathSegment];

    /// Current materialized state of the sub-tree (`null` if absent).
    fn data(&self) -> Value;
}

/// The shared-document broker contract.
///
/// Persistence, authentication, and transport live behind this trait; the
/// engine only submits operations, reads materialized state, and takes
/// scoped handles. Event delivery is host-driven: the embedder forwards each
/// `(kind, ops, origin)` event into
/// [`NotebookBinding::handle_doc_event`](crate::binding::NotebookBinding::handle_doc_event).
pub trait SharedDoc {
    type Sub: SubDoc;

    /// Submit a batch of operations tagged with the submitter's origin.
    fn submit_ops(&mut self, ops: &[Operation], origin: &OriginTag) -> Result<()>;

    /// Current materialized state of the whole document.
    fn data(&self) -> Value;

    /// A scoped handle rooted at `path`.
    fn sub_doc(&self, path: Path) -> Self::Sub;
}
