//! The fact document: `{"ceph": {...}}` assembled strictly through key paths.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the single top-level key of every emitted document.
pub const ROOT_KEY: &str = "ceph";

/// A dot-separated location below the `ceph` root, e.g. `health.detail`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parses a dotted path relative to the root. Empty paths and empty
    /// segments are rejected.
    pub fn parse(dotted: &str) -> Result<Self, DocumentError> {
        let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(DocumentError::InvalidPath(dotted.to_string()));
        }
        Ok(Self { segments })
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True if one path equals or is a prefix of the other.
    pub fn overlaps(&self, other: &KeyPath) -> bool {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", ROOT_KEY, self.segments.join("."))
    }
}

/// The structured snapshot printed on stdout.
///
/// Maps are `serde_json`'s sorted maps, so the same facts always serialize
/// to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactDocument {
    ceph: Map<String, Value>,
}

impl FactDocument {
    /// An empty document, `{"ceph": {}}`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The facts below the root key.
    pub fn facts(&self) -> &Map<String, Value> {
        &self.ceph
    }

    /// Number of facts directly below the root.
    pub fn len(&self) -> usize {
        self.ceph.len()
    }

    /// True when no query contributed anything.
    pub fn is_empty(&self) -> bool {
        self.ceph.is_empty()
    }

    /// Places `value` at `path`. Fails if the path, one of its parents or one
    /// of its children is already taken.
    pub fn insert(&mut self, path: &KeyPath, value: Value) -> Result<(), DocumentError> {
        let conflict = || DocumentError::PathConflict {
            path: path.to_string(),
        };
        let (last, parents) = match path.segments().split_last() {
            Some(split) => split,
            None => return Err(DocumentError::InvalidPath(String::new())),
        };

        let mut node = &mut self.ceph;
        for segment in parents {
            let child = node
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            node = match child {
                Value::Object(map) => map,
                _ => return Err(conflict()),
            };
        }
        if node.contains_key(last) {
            return Err(conflict());
        }
        node.insert(last.clone(), value);
        Ok(())
    }

    /// Value at `path`, if present.
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut value = self.ceph.get(first)?;
        for segment in rest {
            value = value.as_object()?.get(segment)?;
        }
        Some(value)
    }

    /// Looks up a consumer-style dotted path that starts at the root key,
    /// e.g. `ceph.status.health.status`.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let relative = dotted.strip_prefix(ROOT_KEY)?;
        if relative.is_empty() {
            return None;
        }
        let relative = relative.strip_prefix('.')?;
        self.get(&KeyPath::parse(relative).ok()?)
    }

    /// The whole document as a JSON value.
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(ROOT_KEY.to_string(), Value::Object(self.ceph.clone()));
        Value::Object(root)
    }
}
