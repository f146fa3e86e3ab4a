//! Results returned by store actions.

use std::fmt;

use serde_json::Value;

use super::document::{OnAddedFn, RetrievedDoc};

/// What a store's `get` produced.
pub enum GetResponse {
    /// A concrete batch of retrieved documents.
    Docs(Vec<RetrievedDoc>),
    /// Documents will arrive later; the applier must run on every document
    /// reported by stores after this one.
    OnAdded(OnAddedFn),
    /// The store had nothing to report.
    Nothing,
}

impl fmt::Debug for GetResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docs(docs) => f.debug_tuple("Docs").field(docs).finish(),
            Self::OnAdded(_) => write!(f, "OnAdded(..)"),
            Self::Nothing => write!(f, "Nothing"),
        }
    }
}

/// The result of one store's turn for a non-streaming action.
#[derive(Debug)]
pub enum ActionOutput {
    /// Result of `get`.
    Get(GetResponse),
    /// Result of `insert`: the generated id, if the store generated one.
    Inserted(Option<String>),
    /// Result of `merge`, `assign`, `replace`, `deleteProp`: the resulting data.
    Written(Value),
    /// Result of `delete`.
    Deleted,
}

impl ActionOutput {
    /// Returns the generated id of an `insert`, if it is a non-empty string.
    pub fn inserted_id(&self) -> Option<&str> {
        match self {
            Self::Inserted(Some(id)) if !id.is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    /// Returns the written data of a write action.
    pub fn written(&self) -> Option<&Value> {
        match self {
            Self::Written(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserted_id_ignores_empty() {
        assert_eq!(ActionOutput::Inserted(Some("42".into())).inserted_id(), Some("42"));
        assert_eq!(ActionOutput::Inserted(Some(String::new())).inserted_id(), None);
        assert_eq!(ActionOutput::Inserted(None).inserted_id(), None);
        assert_eq!(ActionOutput::Deleted.inserted_id(), None);
    }
}
