//! Desired-state rules consumed by the reconcilers.
//!
//! Rules are pure data: they are declared once per run (from config) and never
//! evaluated with side effects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal `search → replace` substitution for env-style files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvRule {
    pub search: String,
    pub replace: String,
}

impl EnvRule {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }

    /// Key used in failure entries and status lines.
    pub fn key(&self) -> &str {
        &self.search
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldPathError {
    #[error("field path must not be empty")]
    Empty,
    #[error("field path '{0}' has an empty segment")]
    EmptySegment(String),
}

/// Dotted path into a manifest document, e.g. `scripts.dev`.
///
/// Segments are split on `.` with no escaping; script names containing dots
/// cannot be addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Build from segments known to be non-empty.
    pub fn from_segments(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|segment| segment.to_string()).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Split into parent segments and the leaf key.
    pub fn split_leaf(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((leaf, parents)) => (parents, leaf.as_str()),
            None => (&[], ""),
        }
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().is_empty() {
            return Err(FieldPathError::Empty);
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(FieldPathError::EmptySegment(raw.to_string()));
        }
        Ok(Self { segments })
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FieldPathError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Wholesale overwrite of a manifest field with a string sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRule {
    pub field: FieldPath,
    pub sequence: Vec<String>,
    /// Literals expected in the serialized manifest once the field is set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<String>,
}

/// Everything one command wants to converge, declared once per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    pub env: Vec<EnvRule>,
    pub scripts: Vec<ScriptRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_path_parses_dotted_segments() {
        let path: FieldPath = "scripts.post-create-project-cmd".parse().expect("path");
        assert_eq!(path.segments(), ["scripts", "post-create-project-cmd"]);
        let (parents, leaf) = path.split_leaf();
        assert_eq!(parents, ["scripts"]);
        assert_eq!(leaf, "post-create-project-cmd");
        assert_eq!(path.to_string(), "scripts.post-create-project-cmd");
    }

    #[test]
    fn field_path_rejects_empty_segments() {
        assert_eq!("".parse::<FieldPath>(), Err(FieldPathError::Empty));
        assert!(matches!(
            "scripts..dev".parse::<FieldPath>(),
            Err(FieldPathError::EmptySegment(_))
        ));
    }

    #[test]
    fn script_rule_reads_field_as_string() {
        let rule: ScriptRule =
            serde_json::from_str(r#"{"field":"scripts.dev","sequence":["a","b"]}"#)
                .expect("rule");
        assert_eq!(rule.field.to_string(), "scripts.dev");
        assert!(rule.markers.is_empty());
    }
}
