//! Operation builders for the other consumers of the shared document.
//!
//! The message log and per-cell annotation state speak the same operation
//! protocol but implement no synchronization logic of their own: the log is
//! append-only (each entry a list insert addressed by a single root index)
//! and annotation data is a field replace under the owning cell's metadata.

use json0::{Operation, Path, PathSegment};
use serde_json::Value;

use crate::doc::{keys, paths};

/// Append `message` to an append-only log document at `index` (the log's
/// current length).
pub fn log_append(index: usize, message: Value) -> Operation {
    let path: Path = vec![PathSegment::Index(index)];
    Operation::list_insert(path, message)
}

/// If `op` is a log append, its index and message.
pub fn as_log_append(op: &Operation) -> Option<(usize, &Value)> {
    match op {
        Operation::ListInsert { path, value } => match path.as_slice() {
            [PathSegment::Index(i)] => Some((*i, value)),
            _ => None,
        },
        _ => None,
    }
}

/// Replace the annotation state stored under cell `cell_index`'s metadata.
pub fn annotation_replace(cell_index: usize, old: Value, new: Value) -> Operation {
    Operation::obj_replace(paths::metadata_field(cell_index, keys::ANNOTATION), old, new)
}

/// If `op` is an annotation replace, the owning cell's index and the new
/// annotation value.
pub fn as_annotation_replace(op: &Operation) -> Option<(usize, &Value)> {
    match op {
        Operation::ObjReplace { path, new, .. } => match path.as_slice() {
            [PathSegment::Key(a), PathSegment::Key(b), PathSegment::Index(i), PathSegment::Key(c), PathSegment::Key(d)]
                if a == keys::NOTEBOOK
                    && b == keys::CELLS
                    && c == keys::METADATA
                    && d == keys::ANNOTATION =>
            {
                Some((*i, new))
            }
            _ => None,
        },
        _ => None,
    }
}
