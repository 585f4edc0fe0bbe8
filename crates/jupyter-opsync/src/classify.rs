//! Mapping operations to their semantic kind.

use json0::{Operation, PathSegment};
use serde_json::Value;

use crate::doc::keys;

/// The semantic kind of one operation, with its payload borrowed out.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind<'a> {
    /// A cell was inserted before `index`.
    StructuralInsert { index: usize, cell: &'a Value },
    /// The cell at `index` was removed.
    StructuralDelete { index: usize, cell: &'a Value },
    /// The execution count of the cell at `index` changed.
    ExecutionCountChange { index: usize, old: &'a Value, new: &'a Value },
    /// The outputs of the cell at `index` were replaced wholesale.
    OutputsChange { index: usize, old: &'a Value, new: &'a Value },
    /// The whole cell at `index` was atomically replaced (type conversion).
    TypeChange { index: usize, old: &'a Value, new: &'a Value },
    /// No recognized kind; non-fatal, logged and dropped by the consumer.
    Unclassified,
}

/// Is `path` exactly `[notebook, cells, <index>]`?
fn cell_list_index(path: &[PathSegment]) -> Option<usize> {
    match path {
        [PathSegment::Key(a), PathSegment::Key(b), PathSegment::Index(i)]
            if a == keys::NOTEBOOK && b == keys::CELLS =>
        {
            Some(*i)
        }
        _ => None,
    }
}

/// Is `path` `[notebook, cells, <index>, <field>]`?
fn cell_field_index<'p>(path: &'p [PathSegment]) -> Option<(usize, &'p str)> {
    match path {
        [PathSegment::Key(a), PathSegment::Key(b), PathSegment::Index(i), PathSegment::Key(field)]
            if a == keys::NOTEBOOK && b == keys::CELLS =>
        {
            Some((*i, field.as_str()))
        }
        _ => None,
    }
}

/// Classify one operation. Pure and total; first match wins.
pub fn classify(op: &Operation) -> OpKind<'_> {
    match op {
        Operation::ListInsert { path, value } => match cell_list_index(path) {
            Some(index) => OpKind::StructuralInsert { index, cell: value },
            None => OpKind::Unclassified,
        },
        Operation::ListDelete { path, value } => match cell_list_index(path) {
            Some(index) => OpKind::StructuralDelete { index, cell: value },
            None => OpKind::Unclassified,
        },
        Operation::ObjReplace { path, old, new } => match cell_field_index(path) {
            Some((index, keys::EXECUTION_COUNT)) => {
                OpKind::ExecutionCountChange { index, old, new }
            }
            Some((index, keys::OUTPUTS)) => OpKind::OutputsChange { index, old, new },
            _ => OpKind::Unclassified,
        },
        Operation::ListReplace { path, old, new } => match cell_list_index(path) {
            Some(index) => OpKind::TypeChange { index, old, new },
            None => OpKind::Unclassified,
        },
    }
}
