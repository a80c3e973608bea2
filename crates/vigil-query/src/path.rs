//! Dotted, optionally indexed field paths.
//!
//! `source(0).node.address(-1).address` has four segments; two of them carry
//! a list index. The canonical form drops every index and is the key used to
//! look a path up in a schema.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Index attached to a path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Index {
    /// Position in the list; negative values count from the end.
    Position(i64),
    /// Element whose indexing key equals this string.
    Key(String),
    /// Any element, written `(*)`.
    Any,
}

impl Index {
    /// Whether this index designates one element of the list.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, Self::Any)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(n) => write!(f, "{}", n),
            Self::Key(key) => {
                f.write_str("\"")?;
                for c in key.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")
            }
            Self::Any => f.write_str("*"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub name: String,
    pub index: Option<Index>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    pub fn indexed(name: impl Into<String>, index: Index) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }

    /// True when the segment selects one list element.
    pub fn has_explicit_index(&self) -> bool {
        self.index.as_ref().is_some_and(Index::is_explicit)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.index {
            Some(index) => write!(f, "{}({})", self.name, index),
            None => f.write_str(&self.name),
        }
    }
}

/// A parsed field path. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Parse the textual form, e.g. `alert.source(0).node.name`.
    pub fn parse(text: &str) -> Result<Self> {
        crate::syntax::parse_path(text)
    }

    /// Build a path from segments. Returns `None` for an empty list.
    pub fn from_segments(segments: Vec<Segment>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    /// Name of the last segment.
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(|s| s.name.as_str())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path with every index removed.
    pub fn canonical(&self) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .map(|s| Segment::new(s.name.clone()))
                .collect(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.segments.iter().all(|s| s.index.is_none())
    }

    pub fn is_indexed(&self) -> bool {
        !self.is_canonical()
    }

    /// Path without its last segment, `None` for a single segment.
    pub fn parent(&self) -> Option<Self> {
        Self::from_segments(self.segments[..self.segments.len() - 1].to_vec())
    }

    /// Leading sub-paths, shortest first, including the path itself.
    pub fn prefixes(&self) -> impl Iterator<Item = Path> + '_ {
        (1..=self.segments.len()).map(|n| Self {
            segments: self.segments[..n].to_vec(),
        })
    }

    /// Append `other` after this path.
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Append a single unindexed segment.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::new(name));
        Self { segments }
    }

    /// Split a fully qualified path into its entity type and the
    /// entity-relative remainder (`alert.source.node` -> `alert`, `source.node`).
    pub fn strip_entity(&self) -> Option<(&str, Self)> {
        let (head, rest) = self.segments.split_first()?;
        let rest = Self::from_segments(rest.to_vec())?;
        Some((head.name.as_str(), rest))
    }

    /// Qualify an entity-relative path with its entity type.
    pub fn qualified(&self, entity: &str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(Segment::new(entity));
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = crate::error::QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = crate::error::QueryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use test_case::test_case;

    #[test_case("alert.source(0).node.name", "alert.source.node.name")]
    #[test_case("analyzer(-1).name", "analyzer.name")]
    #[test_case("additional_data(\"key\").data", "additional_data.data")]
    #[test_case("source(*).node.address(*).address", "source.node.address.address")]
    #[test_case("severity", "severity")]
    fn test_canonical(input: &str, expected: &str) {
        let path = Path::parse(input).unwrap();
        assert_eq!(path.canonical().to_string(), expected);
    }

    #[test]
    fn test_canonical_is_idempotent() {
        let path = Path::parse("a(1).b('x').c(*)").unwrap();
        assert_eq!(path.canonical().canonical(), path.canonical());
    }

    #[test]
    fn test_display_keeps_indices() {
        let path = Path::parse("source(0).node.address(-1).address").unwrap();
        assert_eq!(path.to_string(), "source(0).node.address(-1).address");
    }

    #[test]
    fn test_single_quoted_key_is_normalized() {
        let path = Path::parse("additional_data('Ip').data").unwrap();
        assert_eq!(path.to_string(), "additional_data(\"Ip\").data");
    }

    #[test_case(r#"a("x\\").b"# ; "backslash")]
    #[test_case(r#"a("x\"y'z").b"# ; "both quotes")]
    #[test_case(r#"a('it\'s').b"# ; "escaped single quote")]
    #[test_case(r#"a("").b(*)"# ; "empty key")]
    fn test_keyed_index_round_trip(input: &str) {
        let path = Path::parse(input).unwrap();
        assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
    }

    #[test]
    fn test_key_display_escapes_quotes() {
        let path = Path::from_segments(vec![Segment::indexed(
            "a",
            Index::Key("x\"y'z\\".to_string()),
        )])
        .unwrap();
        assert_eq!(path.to_string(), r#"a("x\"y'z\\")"#);
    }

    #[test_case("1abc" ; "starts with digit")]
    #[test_case("a..b" ; "empty segment")]
    #[test_case("a(1.5)" ; "float index")]
    #[test_case("a(b)" ; "unquoted key")]
    #[test_case("" ; "empty")]
    #[test_case("a.b." ; "trailing dot")]
    fn test_malformed(input: &str) {
        assert!(matches!(
            Path::parse(input),
            Err(QueryError::MalformedPath { .. })
        ));
    }

    #[test]
    fn test_strip_entity() {
        let path = Path::parse("alert.source(0).node").unwrap();
        let (entity, rest) = path.strip_entity().unwrap();
        assert_eq!(entity, "alert");
        assert_eq!(rest.to_string(), "source(0).node");
        assert_eq!(rest.qualified("alert"), path);
    }

    #[test]
    fn test_prefixes() {
        let path = Path::parse("a(0).b.c").unwrap();
        let prefixes: Vec<String> = path.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["a(0)", "a(0).b", "a(0).b.c"]);
    }

    #[test]
    fn test_serde_as_text() {
        let path = Path::parse("source(0).node").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"source(0).node\"");
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
