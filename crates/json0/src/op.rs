//! The operation type and its JSON wire codec.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::{self, Path, PathSegment};
use crate::{OpError, Result};

/// An atomic, path-addressed mutation of the shared document.
///
/// The variant is chosen by the producer at submission time; consumers never
/// infer intent from which wire keys happen to be populated, except in the
/// lenient [`Operation::from_wire`] decoder kept for documents persisted in
/// the raw record format.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert `value` before the list index named by the final path segment.
    ListInsert { path: Path, value: Value },
    /// Remove the element at the list index named by the final path segment.
    /// `value` records what the producer believed was removed.
    ListDelete { path: Path, value: Value },
    /// Atomically replace the element at the list index: `old` out, `new` in.
    ListReplace { path: Path, old: Value, new: Value },
    /// Replace the field named by the final path segment: `old` out, `new` in.
    /// `old` may be JSON `null` when the field had no prior value.
    ObjReplace { path: Path, old: Value, new: Value },
}

/// Wire record: `p` plus whichever of `li`/`ld`/`oi`/`od` the variant carries.
#[derive(Serialize, Deserialize)]
struct WireOp {
    p: Path,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    li: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    ld: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    oi: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    od: Option<Value>,
}

/// Distinguish a present JSON `null` from an absent key: a present value
/// (including `null`) decodes to `Some`, while an absent key falls back to the
/// `#[serde(default)]` `None`. The variant match in [`Operation::from_wire_record`]
/// relies on this distinction (an `ObjReplace` whose `od` is JSON `null`).
fn deserialize_some<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Operation {
    pub fn list_insert(path: Path, value: Value) -> Self {
        Operation::ListInsert { path, value }
    }

    pub fn list_delete(path: Path, value: Value) -> Self {
        Operation::ListDelete { path, value }
    }

    pub fn list_replace(path: Path, old: Value, new: Value) -> Self {
        Operation::ListReplace { path, old, new }
    }

    pub fn obj_replace(path: Path, old: Value, new: Value) -> Self {
        Operation::ObjReplace { path, old, new }
    }

    /// The path this operation addresses.
    pub fn path(&self) -> &[PathSegment] {
        match self {
            Operation::ListInsert { path, .. }
            | Operation::ListDelete { path, .. }
            | Operation::ListReplace { path, .. }
            | Operation::ObjReplace { path, .. } => path,
        }
    }

    fn to_wire(&self) -> WireOp {
        match self {
            Operation::ListInsert { path, value } => WireOp {
                p: path.clone(),
                li: Some(value.clone()),
                ld: None,
                oi: None,
                od: None,
            },
            Operation::ListDelete { path, value } => WireOp {
                p: path.clone(),
                li: None,
                ld: Some(value.clone()),
                oi: None,
                od: None,
            },
            Operation::ListReplace { path, old, new } => WireOp {
                p: path.clone(),
                li: Some(new.clone()),
                ld: Some(old.clone()),
                oi: None,
                od: None,
            },
            Operation::ObjReplace { path, old, new } => WireOp {
                p: path.clone(),
                li: None,
                ld: None,
                oi: Some(new.clone()),
                od: Some(old.clone()),
            },
        }
    }

    fn from_wire_record(wire: WireOp) -> Result<Self> {
        let WireOp { p, li, ld, oi, od } = wire;
        match (li, ld, oi, od) {
            (Some(value), None, None, None) => Ok(Operation::ListInsert { path: p, value }),
            (None, Some(value), None, None) => Ok(Operation::ListDelete { path: p, value }),
            (Some(new), Some(old), None, None) => Ok(Operation::ListReplace { path: p, old, new }),
            (None, None, Some(new), Some(old)) => Ok(Operation::ObjReplace { path: p, old, new }),
            _ => Err(OpError::Malformed(format!(
                "unrecognized mutation key combination at {}",
                path::display(&p)
            ))),
        }
    }

    /// Lenient boundary decoder for raw wire records.
    ///
    /// A record whose populated-key combination matches no variant yields
    /// [`OpError::Malformed`]; callers log and drop such operations rather
    /// than failing the stream.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let wire: WireOp = serde_json::from_value(value.clone())?;
        Self::from_wire_record(wire)
    }
}

impl Serialize for Operation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let wire = WireOp::deserialize(deserializer)?;
        Operation::from_wire_record(wire).map_err(serde::de::Error::custom)
    }
}
