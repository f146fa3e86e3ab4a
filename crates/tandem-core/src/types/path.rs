//! Module paths: `collection/doc/collection/doc/...`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A validated path to a collection or a document.
///
/// An odd number of segments addresses a collection, an even number a
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModulePath(String);

impl ModulePath {
    /// Parses and validates a path.
    pub fn parse(path: &str) -> Result<Self, AppError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(AppError::invalid_path("Path must not be empty"));
        }
        if trimmed.split('/').any(|segment| segment.trim().is_empty()) {
            return Err(AppError::invalid_path(format!(
                "Path '{path}' contains an empty segment"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the raw path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of segments in the path.
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// Returns `true` if this path addresses a document.
    pub fn is_doc(&self) -> bool {
        self.depth() % 2 == 0
    }

    /// Returns `true` if this path addresses a collection.
    pub fn is_collection(&self) -> bool {
        !self.is_doc()
    }

    /// The last segment: the document id or the collection id.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The document id, if this path addresses a document.
    pub fn doc_id(&self) -> Option<&str> {
        self.is_doc().then(|| self.id())
    }

    /// The collection this path lives in (itself, for collection paths).
    pub fn collection_path(&self) -> ModulePath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) if self.is_doc() => Self(parent.to_string()),
            _ => self.clone(),
        }
    }

    /// Appends one segment, turning a collection path into a document path
    /// and vice versa. `id` must be a single non-blank segment.
    pub fn child(&self, id: &str) -> Result<ModulePath, AppError> {
        if id.trim().is_empty() || id.contains('/') {
            return Err(AppError::invalid_path(format!(
                "'{id}' is not a single path segment under '{self}'"
            )));
        }
        Ok(Self(format!("{}/{}", self.0, id)))
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ModulePath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModulePath {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModulePath> for String {
    fn from(path: ModulePath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_and_doc_paths() {
        let collection = ModulePath::parse("pokedex").expect("valid");
        assert!(collection.is_collection());
        assert_eq!(collection.doc_id(), None);

        let doc = ModulePath::parse("pokedex/7").expect("valid");
        assert!(doc.is_doc());
        assert_eq!(doc.doc_id(), Some("7"));
        assert_eq!(doc.collection_path().as_str(), "pokedex");
    }

    #[test]
    fn test_child_switches_kind() {
        let collection = ModulePath::parse("users/luca/pokemon").expect("valid");
        let doc = collection.child("42").expect("valid");
        assert_eq!(doc.as_str(), "users/luca/pokemon/42");
        assert!(doc.is_doc());
        assert_eq!(doc.collection_path(), collection);
    }

    #[test]
    fn test_child_takes_exactly_one_segment() {
        let collection = ModulePath::parse("pokedex").expect("valid");
        for id in ["a/b", "/7", "7/", " ", ""] {
            let err = collection.child(id).unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::InvalidPath, "id {id:?}");
        }
        assert!(collection.child("mr-mime").expect("valid").is_doc());
    }

    #[test]
    fn test_rejects_empty_segments() {
        assert!(ModulePath::parse("").is_err());
        assert!(ModulePath::parse("/").is_err());
        assert!(ModulePath::parse("pokedex//7").is_err());
    }

    #[test]
    fn test_trims_outer_slashes() {
        let path: ModulePath = "/data/trainer/".parse().expect("valid");
        assert_eq!(path.as_str(), "data/trainer");
    }
}
