//! Action names, action types, and the error policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The fixed set of actions a module can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionName {
    /// Fetch documents once.
    Get,
    /// Open a live subscription.
    Stream,
    /// Create a document, optionally generating its id.
    Insert,
    /// Deep-merge a payload into a document.
    Merge,
    /// Shallow-assign a payload onto a document.
    Assign,
    /// Replace a document entirely.
    Replace,
    /// Remove one or more properties from a document.
    DeleteProp,
    /// Delete a document.
    Delete,
}

impl ActionName {
    /// Every action, in declaration order.
    pub const ALL: [ActionName; 8] = [
        Self::Get,
        Self::Stream,
        Self::Insert,
        Self::Merge,
        Self::Assign,
        Self::Replace,
        Self::DeleteProp,
        Self::Delete,
    ];

    /// Returns the string name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Stream => "stream",
            Self::Insert => "insert",
            Self::Merge => "merge",
            Self::Assign => "assign",
            Self::Replace => "replace",
            Self::DeleteProp => "deleteProp",
            Self::Delete => "delete",
        }
    }

    /// Returns the action type this action belongs to.
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Get | Self::Stream => ActionType::Read,
            Self::Insert | Self::Merge | Self::Assign | Self::Replace | Self::DeleteProp => {
                ActionType::Write
            }
            Self::Delete => ActionType::Delete,
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown action '{s}'")))
    }
}

/// Coarse grouping of actions used for configuration fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    /// `get` and `stream`.
    Read,
    /// `insert`, `merge`, `assign`, `replace`, `deleteProp`.
    Write,
    /// `delete`.
    Delete,
}

impl ActionType {
    /// Returns the string name of this action type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do when a store action fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnErrorPolicy {
    /// Re-raise the error immediately; later stores never run.
    #[default]
    Stop,
    /// Swallow the error and give the next store its turn.
    Continue,
    /// Revert every store that already succeeded, then re-raise.
    Revert,
}

impl fmt::Display for OnErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Continue => write!(f, "continue"),
            Self::Revert => write!(f, "revert"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_types() {
        assert_eq!(ActionName::Get.action_type(), ActionType::Read);
        assert_eq!(ActionName::Stream.action_type(), ActionType::Read);
        assert_eq!(ActionName::DeleteProp.action_type(), ActionType::Write);
        assert_eq!(ActionName::Delete.action_type(), ActionType::Delete);
    }

    #[test]
    fn test_action_from_str() {
        let action: ActionName = "deleteProp".parse().expect("should parse");
        assert_eq!(action, ActionName::DeleteProp);
        assert!("upsert".parse::<ActionName>().is_err());
    }

    #[test]
    fn test_policy_serde() {
        let policy: OnErrorPolicy = serde_json::from_str("\"revert\"").expect("deserialize");
        assert_eq!(policy, OnErrorPolicy::Revert);
        assert_eq!(OnErrorPolicy::default(), OnErrorPolicy::Stop);
    }
}
