//! Strongly typed process definition schema.
//!
//! Only the parts the variable subsystem consumes are modelled: the process
//! key and version, declared data objects, and the nesting of sub-processes
//! that own their own data-object declarations. Declaration order is
//! preserved so read models render in authoring order.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::localization::LocalizedText;

pub mod validation;

/// A deployed process definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessDefinition {
    /// Deployment-unique identifier (assigned at deployment when left empty).
    #[serde(default)]
    pub id: String,
    /// Key shared by every version of the definition.
    pub key: String,
    /// Optional human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Version number (assigned at deployment).
    #[serde(default)]
    pub version: u32,
    /// Data objects declared at process level.
    #[serde(default)]
    pub data_objects: Vec<DataObjectDefinition>,
    /// Embedded sub-processes.
    #[serde(default)]
    pub sub_processes: Vec<SubProcessDefinition>,
}

/// A sub-process container; its `id` matches the activity id of the scopes it spawns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubProcessDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data_objects: Vec<DataObjectDefinition>,
    #[serde(default)]
    pub sub_processes: Vec<SubProcessDefinition>,
}

/// Declaration of a business data object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataObjectDefinition {
    /// Definition key used by localization entries (for example `stringVarId`).
    pub id: String,
    /// Variable name bound to this declaration.
    pub name: String,
    /// Declared semantic type.
    #[serde(rename = "type", alias = "item_type")]
    pub item_type: DataObjectItemType,
    /// Default description.
    #[serde(default)]
    pub documentation: Option<String>,
    /// Literal applied when the declaring scope is created.
    #[serde(default)]
    pub default_value: Option<JsonValue>,
    /// Localizations embedded in the definition, keyed by locale tag.
    #[serde(default)]
    pub localizations: IndexMap<String, LocalizedText>,
}

/// Semantic types a data object may declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataObjectItemType {
    #[serde(alias = "xsd:string")]
    String,
    #[serde(alias = "xsd:int", alias = "integer")]
    Int,
    #[serde(alias = "xsd:long")]
    Long,
    #[serde(alias = "xsd:double")]
    Double,
    #[serde(alias = "xsd:boolean")]
    Boolean,
    #[serde(alias = "xsd:datetime", alias = "date")]
    Datetime,
}

impl DataObjectItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
        }
    }
}

impl fmt::Display for DataObjectItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessDefinition {
    /// Data objects declared by the container that spawns scopes with `activity_id`.
    ///
    /// `None` addresses the process itself. Scopes whose activity is not a
    /// sub-process (tasks, concurrent branches) have no container.
    pub fn data_objects_for(&self, activity_id: Option<&str>) -> Option<&[DataObjectDefinition]> {
        match activity_id {
            None => Some(&self.data_objects),
            Some(activity_id) => self.find_sub_process(activity_id).map(|sub| sub.data_objects.as_slice()),
        }
    }

    /// Depth-first lookup of a nested sub-process by id.
    pub fn find_sub_process(&self, sub_process_id: &str) -> Option<&SubProcessDefinition> {
        find_in(&self.sub_processes, sub_process_id)
    }
}

fn find_in<'a>(sub_processes: &'a [SubProcessDefinition], sub_process_id: &str) -> Option<&'a SubProcessDefinition> {
    sub_processes.iter().find_map(|sub| {
        if sub.id == sub_process_id {
            Some(sub)
        } else {
            find_in(&sub.sub_processes, sub_process_id)
        }
    })
}
