//! Catalog of deployed process definitions.
//!
//! Deployment validates a definition, assigns it the next version for its key,
//! derives an id of the form `key:version` when none was authored, and keeps
//! every deployed version addressable in deployment order.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tracing::info;
use varscope_types::definition::validation::validate_process_definition;
use varscope_types::{DataObjectDefinition, ProcessDefinition, Scope};

use crate::error::{EngineError, EngineResult};

#[derive(Default)]
pub struct DefinitionCatalog {
    definitions: RwLock<IndexMap<String, Arc<ProcessDefinition>>>,
}

impl DefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition, returning the deployed copy.
    pub fn deploy(&self, mut definition: ProcessDefinition) -> EngineResult<Arc<ProcessDefinition>> {
        definition.key = definition.key.trim().to_string();
        validate_process_definition(&definition).map_err(|reason| EngineError::InvalidDefinition {
            key: definition.key.clone(),
            reason,
        })?;

        let mut definitions = self.write();
        let version = definitions
            .values()
            .filter(|existing| existing.key == definition.key)
            .map(|existing| existing.version)
            .max()
            .unwrap_or(0)
            + 1;
        definition.version = version;
        if definition.id.trim().is_empty() {
            definition.id = format!("{}:{}", definition.key, version);
        }
        if definitions.contains_key(&definition.id) {
            return Err(EngineError::InvalidDefinition {
                key: definition.key,
                reason: format!("duplicate process definition id detected: '{}'", definition.id),
            });
        }

        info!(
            definition_id = %definition.id,
            key = %definition.key,
            version,
            data_objects = definition.data_objects.len(),
            sub_processes = definition.sub_processes.len(),
            "process definition deployed"
        );
        let deployed = Arc::new(definition);
        definitions.insert(deployed.id.clone(), Arc::clone(&deployed));
        Ok(deployed)
    }

    pub fn get(&self, definition_id: &str) -> EngineResult<Arc<ProcessDefinition>> {
        self.read()
            .get(definition_id)
            .cloned()
            .ok_or_else(|| EngineError::DefinitionNotFound(definition_id.to_string()))
    }

    /// Highest deployed version for `key`.
    pub fn latest_by_key(&self, key: &str) -> EngineResult<Arc<ProcessDefinition>> {
        self.read()
            .values()
            .filter(|definition| definition.key == key)
            .max_by_key(|definition| definition.version)
            .cloned()
            .ok_or_else(|| EngineError::DefinitionNotFound(key.to_string()))
    }

    /// Every deployed definition in deployment order.
    pub fn list(&self) -> Vec<Arc<ProcessDefinition>> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Arc<ProcessDefinition>>> {
        self.definitions.read().expect("definition catalog lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Arc<ProcessDefinition>>> {
        self.definitions.write().expect("definition catalog lock poisoned")
    }
}

/// Data objects declared by the container `scope` belongs to.
///
/// The process itself is the container of the root scope only; a sub-process
/// is the container of the scopes it spawns. Any other child scope, with or
/// without an activity, declares nothing and reads its ancestors' data objects.
pub fn container_for<'a>(definition: &'a ProcessDefinition, scope: &Scope) -> Option<&'a [DataObjectDefinition]> {
    match scope.activity_id.as_deref() {
        None if !scope.is_root() => None,
        activity_id => definition.data_objects_for(activity_id),
    }
}
