//! Execution order tables keyed by action name or action type.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::{ActionName, ActionType};

/// Which stores an action visits, and in what order.
///
/// Entries can target a single action (`insert`) or a whole action type
/// (`write`); the action-specific entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct ExecutionOrderTable {
    by_action: HashMap<ActionName, Vec<String>>,
    by_type: HashMap<ActionType, Vec<String>>,
}

impl ExecutionOrderTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the order for a single action.
    pub fn with_action<S: Into<String>>(
        mut self,
        action: ActionName,
        stores: impl IntoIterator<Item = S>,
    ) -> Self {
        self.by_action
            .insert(action, stores.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the order for every action of a type.
    pub fn with_type<S: Into<String>>(
        mut self,
        action_type: ActionType,
        stores: impl IntoIterator<Item = S>,
    ) -> Self {
        self.by_type
            .insert(action_type, stores.into_iter().map(Into::into).collect());
        self
    }

    /// The order configured specifically for `action`.
    pub fn for_action(&self, action: ActionName) -> Option<&[String]> {
        self.by_action.get(&action).map(Vec::as_slice)
    }

    /// The order configured for the type of `action`.
    pub fn for_type(&self, action_type: ActionType) -> Option<&[String]> {
        self.by_type.get(&action_type).map(Vec::as_slice)
    }

    /// Returns `true` if no order is configured.
    pub fn is_empty(&self) -> bool {
        self.by_action.is_empty() && self.by_type.is_empty()
    }

    /// Every store name mentioned anywhere in the table.
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.by_action
            .values()
            .chain(self.by_type.values())
            .flatten()
            .map(String::as_str)
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for ExecutionOrderTable {
    type Error = AppError;

    fn try_from(raw: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        let mut table = Self::new();
        for (key, stores) in raw {
            if stores.iter().any(|s| s.trim().is_empty()) {
                return Err(AppError::configuration(format!(
                    "Execution order '{key}' contains an empty store name"
                )));
            }
            match key.as_str() {
                "read" => table = table.with_type(ActionType::Read, stores),
                "write" => table = table.with_type(ActionType::Write, stores),
                // `delete` is both an action and a type; the action wins.
                other => {
                    let action: ActionName = other.parse().map_err(|_| {
                        AppError::configuration(format!(
                            "Execution order key '{other}' is neither an action nor an action type"
                        ))
                    })?;
                    table = table.with_action(action, stores);
                }
            }
        }
        Ok(table)
    }
}

impl From<ExecutionOrderTable> for BTreeMap<String, Vec<String>> {
    fn from(table: ExecutionOrderTable) -> Self {
        let mut raw = BTreeMap::new();
        for (action_type, stores) in table.by_type {
            raw.insert(action_type.as_str().to_string(), stores);
        }
        for (action, stores) in table.by_action {
            raw.insert(action.as_str().to_string(), stores);
        }
        raw
    }
}
