//! # Varscope Engine
//!
//! Scoped variable resolution for process instances. A running instance is a
//! tree of execution scopes; each scope owns named, typed variables that are
//! resolved along the parent chain, serialized through a pluggable type
//! registry, mirrored into an audit log, and optionally surfaced as localized
//! data objects.
//!
//! ## Usage
//!
//! ```rust
//! use varscope_engine::{VariableRuntime, parse_definition_file};
//! use varscope_types::{Scope, VariableValue};
//!
//! let temp_dir = tempfile::tempdir()?;
//! let definition_path = temp_dir.path().join("order.yaml");
//! std::fs::write(&definition_path, r#"
//! key: order
//! data_objects:
//!   - id: customerId
//!     name: customer
//!     type: string
//! "#)?;
//!
//! let runtime = VariableRuntime::in_memory();
//! runtime.deploy_file(&definition_path)?;
//! let root = runtime.start_process_instance("order", "pi-1", [("customer", "acme")])?;
//!
//! let child = Scope::child_of(&root, "exec-2", None);
//! runtime.on_scope_created(child)?;
//! assert_eq!(runtime.variables().get("exec-2", "customer", false)?, Some(VariableValue::from("acme")));
//! assert_eq!(runtime.variables().get("exec-2", "customer", true)?, None);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`scope`**: flat scope table and visibility resolution
//! - **`value_types`**: ordered variable type registry and the built-in types
//! - **`store`**: scoped variable CRUD with identity-preserving writes
//! - **`history`**: level-aware historic variable log
//! - **`localization`**: locale fallback over definition info documents
//! - **`data_object`**: localized data-object read model
//! - **`definition`**: deployed definition catalog
//! - **`runtime`**: facade used by the execution engine and API layer

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use varscope_types::ProcessDefinition;

pub mod config;
pub mod data_object;
pub mod definition;
pub mod error;
pub mod history;
pub mod localization;
pub mod runtime;
pub mod scope;
pub mod store;
pub mod value_types;

pub use config::EngineConfig;
pub use data_object::{DataObject, DataObjectView};
pub use definition::{DefinitionCatalog, container_for};
pub use error::{EngineError, EngineResult};
pub use history::HistoricVariableLog;
pub use localization::{LocalizationOverlay, language_tag};
pub use runtime::VariableRuntime;
pub use scope::ScopeTree;
pub use store::VariableStore;
pub use value_types::{ValueTypeError, VariableType, VariableTypeRegistry};

/// Loads process definitions from a YAML or JSON file.
///
/// The file may hold a single definition or a bundle with the definitions
/// listed under a `definitions` key. JSON is accepted because it is valid YAML.
///
/// # Errors
///
/// Fails when the file cannot be read or matches neither layout.
pub fn parse_definition_file(file_path: impl AsRef<Path>) -> Result<Vec<ProcessDefinition>> {
    let file_path = file_path.as_ref();
    let file_content = fs::read(file_path).with_context(|| format!("Failed to read definition file: {}", file_path.display()))?;
    let content_string = String::from_utf8_lossy(&file_content);

    // Bundle first, so a bundle is never read as a single definition with ignored fields.
    #[derive(Deserialize)]
    struct DefinitionBundle {
        definitions: Vec<ProcessDefinition>,
    }

    if let Ok(bundle) = serde_yaml::from_str::<DefinitionBundle>(&content_string) {
        return Ok(bundle.definitions);
    }

    let definition = serde_yaml::from_str::<ProcessDefinition>(&content_string).with_context(|| {
        format!(
            "Unsupported definition document in {}. Expected a single definition with a 'key' field or a bundle under 'definitions'",
            file_path.display()
        )
    })?;
    Ok(vec![definition])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_definition() {
        let temp_dir = tempfile::tempdir().unwrap();
        let definition_path = temp_dir.path().join("definition.yaml");
        fs::write(
            &definition_path,
            r#"
key: dataObjectScope
data_objects:
  - id: stringVarId
    name: stringVar
    type: xsd:string
    default_value: coca-cola
sub_processes:
  - id: subprocess1
    data_objects:
      - id: intVarId
        name: intVar
        type: int
"#,
        )
        .unwrap();

        let definitions = parse_definition_file(&definition_path).unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].key, "dataObjectScope");
        assert_eq!(definitions[0].sub_processes[0].data_objects[0].name, "intVar");
    }

    #[test]
    fn parses_json_bundle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let definition_path = temp_dir.path().join("bundle.json");
        fs::write(
            &definition_path,
            r#"{ "definitions": [ { "key": "a" }, { "key": "b", "data_objects": [] } ] }"#,
        )
        .unwrap();

        let definitions = parse_definition_file(&definition_path).expect("parse bundle");
        let keys: Vec<_> = definitions.iter().map(|definition| definition.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn rejects_unknown_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let definition_path = temp_dir.path().join("broken.yaml");
        fs::write(&definition_path, "steps: [1, 2]").unwrap();

        let error = parse_definition_file(&definition_path).unwrap_err();
        assert!(error.to_string().contains("Unsupported definition document"));
    }
}
