//! Document paths: ordered sequences of string keys and list indices.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A path into the document tree.
pub type Path = Vec<PathSegment>;

/// One step of a document path: a map key or a list index.
///
/// On the wire a segment is a bare JSON string or number, matching the
/// `p` arrays produced by every consumer of the shared document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(k) => Some(k),
            PathSegment::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(_) => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathSegment::Key(k) => serializer.serialize_str(k),
            PathSegment::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SegmentVisitor;

        impl Visitor<'_> for SegmentVisitor {
            type Value = PathSegment;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string key or a non-negative integer index")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PathSegment, E> {
                Ok(PathSegment::Key(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PathSegment, E> {
                Ok(PathSegment::Index(v as usize))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PathSegment, E> {
                if v < 0 {
                    return Err(E::custom("negative path index"));
                }
                Ok(PathSegment::Index(v as usize))
            }
        }

        deserializer.deserialize_any(SegmentVisitor)
    }
}

/// Render a path as a `/`-joined string for error messages.
pub fn display(path: &[PathSegment]) -> String {
    let parts: Vec<String> = path.iter().map(|s| s.to_string()).collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_accessors() {
        let key = PathSegment::from("cells");
        assert_eq!(key.as_key(), Some("cells"));
        assert_eq!(key.as_index(), None);

        let index = PathSegment::from(3usize);
        assert_eq!(index.as_index(), Some(3));
        assert_eq!(index.as_key(), None);
    }

    #[test]
    fn test_wire_roundtrip() {
        let path: Path = vec!["notebook".into(), "cells".into(), 2usize.into()];
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!(["notebook", "cells", 2]));

        let back: Path = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_negative_index_rejected() {
        let result: Result<PathSegment, _> = serde_json::from_value(serde_json::json!(-1));
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        let path: Path = vec!["notebook".into(), "cells".into(), 0usize.into()];
        assert_eq!(display(&path), "notebook/cells/0");
    }
}
