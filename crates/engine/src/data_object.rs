//! Read model over variables declared as business data objects.
//!
//! A variable counts as a data object when a data-object declaration with
//! its name exists on the container of the scope that owns it, or on the
//! container of one of that scope's ancestors. Containers are resolved from
//! each scope's `activity_id`: the process for the root, the matching
//! sub-process otherwise. The innermost declaration wins.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;
use varscope_types::{DataObjectDefinition, DataObjectItemType, DefinitionInfo, ProcessDefinition, VariableInstance, VariableValue};

use crate::definition::{DefinitionCatalog, container_for};
use crate::error::EngineResult;
use crate::localization::LocalizationOverlay;
use crate::scope::ScopeTree;
use crate::store::VariableStore;

/// A data-object variable with its declaration and localized metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataObject {
    /// Id of the underlying variable.
    pub id: Uuid,
    pub name: String,
    pub localized_name: String,
    pub description: Option<String>,
    pub value: VariableValue,
    pub item_type: DataObjectItemType,
    pub data_object_definition_key: String,
    pub process_instance_id: String,
    /// Scope that owns the variable, which may be an ancestor of the queried scope.
    pub execution_id: String,
}

pub struct DataObjectView {
    scopes: Arc<ScopeTree>,
    store: Arc<VariableStore>,
    catalog: Arc<DefinitionCatalog>,
    overlay: Arc<LocalizationOverlay>,
}

impl DataObjectView {
    pub fn new(scopes: Arc<ScopeTree>, store: Arc<VariableStore>, catalog: Arc<DefinitionCatalog>, overlay: Arc<LocalizationOverlay>) -> Self {
        Self {
            scopes,
            store,
            catalog,
            overlay,
        }
    }

    /// Data objects visible from `scope_id`, inherited ones included.
    pub fn get_data_objects(
        &self,
        scope_id: &str,
        names: Option<&[&str]>,
        locale: Option<&str>,
        fallback: bool,
    ) -> EngineResult<IndexMap<String, DataObject>> {
        self.collect(scope_id, false, names, locale, fallback)
    }

    /// Data objects owned by `scope_id` itself.
    pub fn get_data_objects_local(
        &self,
        scope_id: &str,
        names: Option<&[&str]>,
        locale: Option<&str>,
        fallback: bool,
    ) -> EngineResult<IndexMap<String, DataObject>> {
        self.collect(scope_id, true, names, locale, fallback)
    }

    pub fn get_data_object(&self, scope_id: &str, name: &str, locale: Option<&str>, fallback: bool) -> EngineResult<Option<DataObject>> {
        Ok(self.collect(scope_id, false, Some(std::slice::from_ref(&name)), locale, fallback)?.shift_remove(name))
    }

    pub fn get_data_object_local(&self, scope_id: &str, name: &str, locale: Option<&str>, fallback: bool) -> EngineResult<Option<DataObject>> {
        Ok(self.collect(scope_id, true, Some(std::slice::from_ref(&name)), locale, fallback)?.shift_remove(name))
    }

    fn collect(
        &self,
        scope_id: &str,
        local: bool,
        names: Option<&[&str]>,
        locale: Option<&str>,
        fallback: bool,
    ) -> EngineResult<IndexMap<String, DataObject>> {
        let instances = match names {
            Some(names) => self.store.get_instances_filtered(scope_id, local, names)?,
            None => self.store.get_instances(scope_id, local)?,
        };

        let mut infos: HashMap<String, DefinitionInfo> = HashMap::new();
        let mut data_objects = IndexMap::new();
        for (name, instance) in instances {
            let Some((definition, declaration)) = self.declaration_for(&instance)? else {
                continue;
            };
            if !infos.contains_key(&definition.id) {
                infos.insert(definition.id.clone(), self.overlay.info(&definition.id)?);
            }
            let info = &infos[&definition.id];
            let text = LocalizationOverlay::resolve_with(info, &declaration, locale, fallback);
            data_objects.insert(name, into_data_object(instance, &declaration, text.name, text.description));
        }
        Ok(data_objects)
    }

    /// Innermost declaration matching the variable, searched from its owning scope upward.
    fn declaration_for(&self, instance: &VariableInstance) -> EngineResult<Option<(Arc<ProcessDefinition>, DataObjectDefinition)>> {
        let chain = self.scopes.resolve_chain(&instance.scope_id)?;
        let Some(definition_id) = chain.first().and_then(|owner| owner.process_definition_id.clone()) else {
            return Ok(None);
        };
        let definition = self.catalog.get(&definition_id)?;
        let declaration = chain.iter().find_map(|scope| {
            container_for(&definition, scope)?
                .iter()
                .find(|declaration| declaration.name == instance.name)
                .cloned()
        });
        Ok(declaration.map(|declaration| (definition, declaration)))
    }
}

fn into_data_object(
    instance: VariableInstance,
    declaration: &DataObjectDefinition,
    localized_name: Option<String>,
    description: Option<String>,
) -> DataObject {
    DataObject {
        id: instance.id,
        localized_name: localized_name.unwrap_or_else(|| declaration.name.clone()),
        description,
        value: instance.cached_value.unwrap_or(VariableValue::Null),
        item_type: declaration.item_type,
        data_object_definition_key: declaration.id.clone(),
        process_instance_id: instance.process_instance_id,
        execution_id: instance.scope_id,
        name: instance.name,
    }
}
