//! Typed view over a JSON dependency manifest (`composer.json`).
//!
//! The document root must decode to a mapping. Fields addressed by a
//! [`FieldPath`] must be reached through mappings only, and script entries are
//! either a single command string or a sequence of command strings. Any other
//! shape is reported as an error rather than indexed permissively. Values the
//! reconcilers never address (versions, flags, nested config) are carried
//! through untouched in their original key order.

use serde_json::{Map, Value};
use thiserror::Error;

use super::rules::FieldPath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("not valid JSON: {0}")]
    Syntax(String),
    #[error("expected a mapping at the document root, found {0}")]
    RootNotMapping(&'static str),
    #[error("'{path}' cannot be set: '{segment}' is {found}, not a mapping")]
    PathConflict {
        path: String,
        segment: String,
        found: &'static str,
    },
    #[error("'{path}' is {found}, expected a string or a sequence of strings")]
    UnexpectedShape { path: String, found: &'static str },
    #[error("encode manifest: {0}")]
    Encode(String),
}

/// A script entry: `"cmd"` or `["cmd", "cmd"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEntry {
    Command(String),
    Sequence(Vec<String>),
}

impl ScriptEntry {
    fn from_value(path: &FieldPath, value: &Value) -> Result<Self, ManifestError> {
        match value {
            Value::String(command) => Ok(ScriptEntry::Command(command.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(command) => Ok(command.clone()),
                    other => Err(ManifestError::UnexpectedShape {
                        path: path.to_string(),
                        found: shape_name(other),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ScriptEntry::Sequence),
            other => Err(ManifestError::UnexpectedShape {
                path: path.to_string(),
                found: shape_name(other),
            }),
        }
    }
}

/// Decoded manifest with stable key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    root: Map<String, Value>,
}

impl ManifestDocument {
    pub fn decode(raw: &str) -> Result<Self, ManifestError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| ManifestError::Syntax(err.to_string()))?;
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ManifestError::RootNotMapping(shape_name(&other))),
        }
    }

    /// Pretty-printed JSON (2-space indent, unescaped slashes) with trailing newline.
    pub fn encode(&self) -> Result<String, ManifestError> {
        let mut buf = serde_json::to_string_pretty(&self.root)
            .map_err(|err| ManifestError::Encode(err.to_string()))?;
        buf.push('\n');
        Ok(buf)
    }

    /// Raw value at `path`, if every parent segment is a mapping.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let (parents, leaf) = path.split_leaf();
        let mut map = &self.root;
        for segment in parents {
            map = map.get(segment)?.as_object()?;
        }
        map.get(leaf)
    }

    /// Typed script entry at `path`; `Ok(None)` when absent.
    pub fn script(&self, path: &FieldPath) -> Result<Option<ScriptEntry>, ManifestError> {
        self.get(path)
            .map(|value| ScriptEntry::from_value(path, value))
            .transpose()
    }

    /// Deep equality between the field at `path` and `sequence`.
    pub fn field_matches(&self, path: &FieldPath, sequence: &[String]) -> bool {
        matches!(
            self.script(path),
            Ok(Some(ScriptEntry::Sequence(current))) if current == sequence
        )
    }

    /// Overwrite the field at `path` with `sequence`, creating missing parents.
    pub fn set_sequence(
        &mut self,
        path: &FieldPath,
        sequence: &[String],
    ) -> Result<(), ManifestError> {
        let (parents, leaf) = path.split_leaf();
        let mut map = &mut self.root;
        for segment in parents {
            let entry = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            let found = shape_name(entry);
            map = entry
                .as_object_mut()
                .ok_or_else(|| ManifestError::PathConflict {
                    path: path.to_string(),
                    segment: segment.clone(),
                    found,
                })?;
        }
        let value = Value::Array(sequence.iter().cloned().map(Value::String).collect());
        map.insert(leaf.to_string(), value);
        Ok(())
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
