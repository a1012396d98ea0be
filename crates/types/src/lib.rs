//! Shared type definitions for the varscope workspace.
//!
//! The engine, the persistence backends, and the CLI all speak in terms of the
//! records defined here: execution scopes, typed variable values and their
//! storage carriers, live and historic variable rows, process definitions with
//! their declared data objects, and the localization documents layered on top.

use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod definition;
pub mod localization;
pub mod value;
pub mod variable;

pub use definition::{DataObjectDefinition, DataObjectItemType, ProcessDefinition, SubProcessDefinition};
pub use localization::{DefinitionInfo, LocalizationEntry, LocalizedText};
pub use value::{CustomValue, ValueFields, VariableValue};
pub use variable::{HistoricVariableInstance, VariableInstance};

/// A node in the execution tree that can own variables.
///
/// Scopes are stored flat and keyed by id; the tree shape is carried only by
/// `parent_id` back-references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Unique scope identifier assigned by the execution engine.
    pub id: String,
    /// Parent scope; `None` only for the process instance root.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Identifier of the root scope, shared by every scope of the tree.
    pub process_instance_id: String,
    /// Deployed process definition governing this tree.
    #[serde(default)]
    pub process_definition_id: Option<String>,
    /// Graph node that spawned this scope (for example a sub-process id).
    #[serde(default)]
    pub activity_id: Option<String>,
}

impl Scope {
    /// Build a process instance root scope.
    pub fn root(id: impl Into<String>, process_definition_id: Option<String>) -> Self {
        let id = id.into();
        Self {
            process_instance_id: id.clone(),
            id,
            parent_id: None,
            process_definition_id,
            activity_id: None,
        }
    }

    /// Build a child scope of `parent`, inheriting its process instance and definition.
    pub fn child_of(parent: &Scope, id: impl Into<String>, activity_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent.id.clone()),
            process_instance_id: parent.process_instance_id.clone(),
            process_definition_id: parent.process_definition_id.clone(),
            activity_id,
        }
    }

    /// Returns `true` for the process instance root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// How much history the runtime records.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryLevel {
    /// Nothing is recorded.
    None,
    /// Activity level history, including variable snapshots.
    Activity,
    /// Audit history.
    #[default]
    Audit,
    /// Full detail.
    Full,
}

impl HistoryLevel {
    /// Returns `true` when the level is at least `other`.
    pub fn is_at_least(self, other: HistoryLevel) -> bool {
        self >= other
    }

    /// Returns `true` when historic variable instances are captured.
    pub fn captures_variables(self) -> bool {
        self.is_at_least(HistoryLevel::Activity)
    }
}

impl fmt::Display for HistoryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Activity => "activity",
            Self::Audit => "audit",
            Self::Full => "full",
        };
        f.write_str(label)
    }
}

impl FromStr for HistoryLevel {
    type Err = ParseHistoryLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "activity" => Ok(Self::Activity),
            "audit" => Ok(Self::Audit),
            "full" => Ok(Self::Full),
            _ => Err(ParseHistoryLevelError),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseHistoryLevelError;

impl fmt::Display for ParseHistoryLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid history level; expected one of 'none', 'activity', 'audit', 'full'")
    }
}

impl Error for ParseHistoryLevelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_levels_are_ordered() {
        assert!(HistoryLevel::Full.is_at_least(HistoryLevel::Audit));
        assert!(HistoryLevel::Audit.is_at_least(HistoryLevel::Activity));
        assert!(!HistoryLevel::None.is_at_least(HistoryLevel::Activity));
        assert!(!HistoryLevel::None.captures_variables());
        assert!(HistoryLevel::Activity.captures_variables());
    }

    #[test]
    fn parses_history_levels() {
        assert_eq!("FULL".parse::<HistoryLevel>(), Ok(HistoryLevel::Full));
        assert_eq!(" none ".parse::<HistoryLevel>(), Ok(HistoryLevel::None));
        assert!("verbose".parse::<HistoryLevel>().is_err());
    }

    #[test]
    fn child_scope_inherits_instance_and_definition() {
        let root = Scope::root("pi-1", Some("proc:1".into()));
        let child = Scope::child_of(&root, "exec-2", Some("subprocess1".into()));

        assert!(root.is_root());
        assert!(!child.is_root());
        assert_eq!(child.process_instance_id, "pi-1");
        assert_eq!(child.process_definition_id.as_deref(), Some("proc:1"));
        assert_eq!(child.parent_id.as_deref(), Some("pi-1"));
    }
}
