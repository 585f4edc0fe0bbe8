//! Applying operations to a materialized JSON document.

use serde_json::Value;

use crate::op::Operation;
use crate::path::{self, PathSegment};
use crate::{OpError, Result};

/// Read the value at `path` in `root`, if present.
pub fn value_at<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = match segment {
            PathSegment::Key(k) => current.as_object()?.get(k)?,
            PathSegment::Index(i) => current.as_array()?.get(*i)?,
        };
    }
    Some(current)
}

/// Apply one operation to a JSON tree.
///
/// The recorded deleted/old value is advisory and is not compared against
/// the tree; concurrent-edit equality checks belong to the document broker.
pub fn apply_op(root: &mut Value, op: &Operation) -> Result<()> {
    let full_path = op.path();
    let (parent_path, last) = match full_path.split_last() {
        Some((last, parent)) => (parent, last),
        None => {
            return Err(OpError::Malformed("operation with empty path".to_string()));
        }
    };

    let parent = resolve_mut(root, parent_path)?;

    match op {
        Operation::ListInsert { value, .. } => {
            let list = as_array_mut(parent, parent_path)?;
            let index = index_of(last, full_path)?;
            if index > list.len() {
                return Err(OpError::IndexOutOfBounds { index, len: list.len() });
            }
            list.insert(index, value.clone());
        }
        Operation::ListDelete { .. } => {
            let list = as_array_mut(parent, parent_path)?;
            let index = index_of(last, full_path)?;
            if index >= list.len() {
                return Err(OpError::IndexOutOfBounds { index, len: list.len() });
            }
            list.remove(index);
        }
        Operation::ListReplace { new, .. } => {
            let list = as_array_mut(parent, parent_path)?;
            let index = index_of(last, full_path)?;
            if index >= list.len() {
                return Err(OpError::IndexOutOfBounds { index, len: list.len() });
            }
            list[index] = new.clone();
        }
        Operation::ObjReplace { new, .. } => {
            let map = parent
                .as_object_mut()
                .ok_or_else(|| OpError::TypeMismatch(path::display(parent_path)))?;
            let key = last
                .as_key()
                .ok_or_else(|| OpError::TypeMismatch(path::display(full_path)))?;
            map.insert(key.to_string(), new.clone());
        }
    }

    Ok(())
}

fn resolve_mut<'a>(root: &'a mut Value, path: &[PathSegment]) -> Result<&'a mut Value> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        current = match segment {
            PathSegment::Key(k) => current
                .as_object_mut()
                .ok_or_else(|| OpError::TypeMismatch(path::display(&path[..depth])))?
                .get_mut(k)
                .ok_or_else(|| OpError::PathNotFound(path::display(&path[..=depth])))?,
            PathSegment::Index(i) => {
                let list = current
                    .as_array_mut()
                    .ok_or_else(|| OpError::TypeMismatch(path::display(&path[..depth])))?;
                let len = list.len();
                list.get_mut(*i)
                    .ok_or(OpError::IndexOutOfBounds { index: *i, len })?
            }
        };
    }
    Ok(current)
}

fn as_array_mut<'a>(value: &'a mut Value, at: &[PathSegment]) -> Result<&'a mut Vec<Value>> {
    value
        .as_array_mut()
        .ok_or_else(|| OpError::TypeMismatch(path::display(at)))
}

fn index_of(segment: &PathSegment, full_path: &[PathSegment]) -> Result<usize> {
    segment
        .as_index()
        .ok_or_else(|| OpError::Malformed(format!(
            "list operation path must end in an index: {}",
            path::display(full_path)
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use serde_json::json;

    fn notebook() -> Value {
        json!({
            "notebook": {
                "cells": [
                    {"cell_type": "code", "source": "a", "execution_count": null},
                    {"cell_type": "markdown", "source": "b"},
                ]
            }
        })
    }

    fn cells_path(index: usize) -> Path {
        vec!["notebook".into(), "cells".into(), index.into()]
    }

    #[test]
    fn test_list_insert() {
        let mut doc = notebook();
        let op = Operation::list_insert(cells_path(1), json!({"cell_type": "raw"}));
        apply_op(&mut doc, &op).unwrap();

        let cells = doc["notebook"]["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[1]["cell_type"], "raw");
        assert_eq!(cells[2]["cell_type"], "markdown");
    }

    #[test]
    fn test_list_insert_at_end() {
        let mut doc = notebook();
        let op = Operation::list_insert(cells_path(2), json!({"cell_type": "raw"}));
        apply_op(&mut doc, &op).unwrap();
        assert_eq!(doc["notebook"]["cells"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_list_insert_out_of_bounds() {
        let mut doc = notebook();
        let op = Operation::list_insert(cells_path(5), json!({}));
        let err = apply_op(&mut doc, &op).unwrap_err();
        assert!(matches!(err, OpError::IndexOutOfBounds { index: 5, len: 2 }));
    }

    #[test]
    fn test_list_delete() {
        let mut doc = notebook();
        let op = Operation::list_delete(cells_path(0), json!({}));
        apply_op(&mut doc, &op).unwrap();

        let cells = doc["notebook"]["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0]["cell_type"], "markdown");
    }

    #[test]
    fn test_list_replace() {
        let mut doc = notebook();
        let op = Operation::list_replace(cells_path(0), json!({}), json!({"cell_type": "markdown", "source": "a"}));
        apply_op(&mut doc, &op).unwrap();

        let cells = doc["notebook"]["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0]["cell_type"], "markdown");
    }

    #[test]
    fn test_obj_replace_field() {
        let mut doc = notebook();
        let mut path = cells_path(0);
        path.push("execution_count".into());
        let op = Operation::obj_replace(path, Value::Null, json!(3));
        apply_op(&mut doc, &op).unwrap();
        assert_eq!(doc["notebook"]["cells"][0]["execution_count"], json!(3));
    }

    #[test]
    fn test_obj_replace_creates_missing_field() {
        // The prior value being absent is fine; `old` is advisory.
        let mut doc = notebook();
        let mut path = cells_path(1);
        path.push("outputs".into());
        let op = Operation::obj_replace(path, Value::Null, json!([]));
        apply_op(&mut doc, &op).unwrap();
        assert_eq!(doc["notebook"]["cells"][1]["outputs"], json!([]));
    }

    #[test]
    fn test_missing_parent_path() {
        let mut doc = notebook();
        let path: Path = vec!["scratch".into(), 0usize.into()];
        let op = Operation::list_insert(path, json!(1));
        assert!(matches!(
            apply_op(&mut doc, &op),
            Err(OpError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_list_op_on_object_is_type_mismatch() {
        let mut doc = notebook();
        let path: Path = vec!["notebook".into(), 0usize.into()];
        let op = Operation::list_insert(path, json!(1));
        assert!(matches!(
            apply_op(&mut doc, &op),
            Err(OpError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_value_at() {
        let doc = notebook();
        let path: Path = vec!["notebook".into(), "cells".into(), 1usize.into(), "source".into()];
        assert_eq!(value_at(&doc, &path), Some(&json!("b")));

        let missing: Path = vec!["notebook".into(), "cells".into(), 9usize.into()];
        assert_eq!(value_at(&doc, &missing), None);
    }
}
