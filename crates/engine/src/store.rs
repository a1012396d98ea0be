//! Scoped CRUD over variable rows.
//!
//! Every operation is anchored at a scope and takes a `local` flag. Local
//! operations only ever touch the anchor scope; global ones walk the scope
//! chain innermost first and act on the first scope that owns the name,
//! creating the variable in the anchor scope when no scope does.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;
use varscope_types::{VariableInstance, VariableValue};
use varscope_util::VariableRowStore;

use crate::error::{EngineError, EngineResult};
use crate::history::HistoricVariableLog;
use crate::scope::ScopeTree;
use crate::value_types::VariableTypeRegistry;

pub struct VariableStore {
    scopes: Arc<ScopeTree>,
    registry: Arc<VariableTypeRegistry>,
    rows: Arc<dyn VariableRowStore>,
    history: Arc<HistoricVariableLog>,
}

impl VariableStore {
    pub fn new(
        scopes: Arc<ScopeTree>,
        registry: Arc<VariableTypeRegistry>,
        rows: Arc<dyn VariableRowStore>,
        history: Arc<HistoricVariableLog>,
    ) -> Self {
        Self {
            scopes,
            registry,
            rows,
            history,
        }
    }

    /// Value of `name` as seen from `scope_id`.
    ///
    /// `Ok(None)` means no such variable; a variable holding null comes back as
    /// `Some(VariableValue::Null)`.
    pub fn get(&self, scope_id: &str, name: &str, local: bool) -> EngineResult<Option<VariableValue>> {
        match self.locate(scope_id, name, local)? {
            Some(instance) => Ok(Some(self.registry.deserialize(&instance.type_name, &instance.fields)?)),
            None => Ok(None),
        }
    }

    /// Variable row for `name` as seen from `scope_id`, with its value cached.
    pub fn get_instance(&self, scope_id: &str, name: &str, local: bool) -> EngineResult<Option<VariableInstance>> {
        self.locate(scope_id, name, local)?
            .map(|instance| self.hydrate(instance))
            .transpose()
    }

    /// Every visible variable keyed by name; inner scopes shadow outer ones.
    pub fn get_instances(&self, scope_id: &str, local: bool) -> EngineResult<IndexMap<String, VariableInstance>> {
        let mut visible = IndexMap::new();
        for owner in self.search_path(scope_id, local)? {
            for instance in self.rows.list_by_scope(&owner)? {
                if !visible.contains_key(&instance.name) {
                    visible.insert(instance.name.clone(), self.hydrate(instance)?);
                }
            }
        }
        Ok(visible)
    }

    /// Like [`VariableStore::get_instances`], restricted to `names`.
    pub fn get_instances_filtered(&self, scope_id: &str, local: bool, names: &[&str]) -> EngineResult<IndexMap<String, VariableInstance>> {
        let mut visible = IndexMap::new();
        for name in names {
            if visible.contains_key(*name) {
                continue;
            }
            if let Some(instance) = self.get_instance(scope_id, name, local)? {
                visible.insert(name.to_string(), instance);
            }
        }
        Ok(visible)
    }

    pub fn get_all(&self, scope_id: &str, local: bool) -> EngineResult<IndexMap<String, VariableValue>> {
        Ok(values_of(self.get_instances(scope_id, local)?))
    }

    pub fn get_all_filtered(&self, scope_id: &str, local: bool, names: &[&str]) -> EngineResult<IndexMap<String, VariableValue>> {
        Ok(values_of(self.get_instances_filtered(scope_id, local, names)?))
    }

    /// Visible variable names, innermost scope first.
    pub fn variable_names(&self, scope_id: &str, local: bool) -> EngineResult<Vec<String>> {
        Ok(self.get_instances(scope_id, local)?.into_keys().collect())
    }

    /// Whether `scope_id` itself owns a variable called `name`.
    pub fn is_local(&self, scope_id: &str, name: &str) -> EngineResult<bool> {
        Ok(self.locate(scope_id, name, true)?.is_some())
    }

    /// Write `value` under `name`, updating the owning row in place or creating one in `scope_id`.
    ///
    /// An existing row keeps its id whatever the new value's type; the
    /// returned instance reflects the stored state.
    pub fn set(&self, scope_id: &str, name: &str, value: impl Into<VariableValue>, local: bool) -> EngineResult<VariableInstance> {
        let value = value.into();
        let existing = self.locate(scope_id, name, local)?;
        let (variable_type, fields) = self.registry.serialize(&value)?;
        let now = Utc::now();

        let mut instance = match existing {
            Some(mut instance) => {
                let expected_revision = instance.revision;
                instance.type_name = variable_type.type_name().to_string();
                instance.fields = fields;
                let revision = self
                    .rows
                    .update(instance.clone(), expected_revision)
                    .map_err(|error| EngineError::from_row_write(error, &instance))?;
                instance.revision = revision;
                debug!(
                    variable_id = %instance.id,
                    scope_id = %instance.scope_id,
                    name = %name,
                    type_name = %instance.type_name,
                    revision = instance.revision,
                    "variable updated"
                );
                self.history.record_updated(&instance, &value, now)?;
                instance
            }
            None => {
                let scope = self.scopes.get(scope_id)?;
                let instance = VariableInstance {
                    id: Uuid::new_v4(),
                    scope_id: scope.id,
                    process_instance_id: scope.process_instance_id,
                    name: name.to_string(),
                    type_name: variable_type.type_name().to_string(),
                    fields,
                    revision: 0,
                    cached_value: None,
                };
                self.rows
                    .insert(instance.clone())
                    .map_err(|error| EngineError::from_row_write(error, &instance))?;
                debug!(
                    variable_id = %instance.id,
                    scope_id = %instance.scope_id,
                    name = %name,
                    type_name = %instance.type_name,
                    "variable created"
                );
                self.history.record_created(&instance, &value, now)?;
                instance
            }
        };

        if variable_type.is_cachable() {
            instance.cached_value = Some(value);
        }
        Ok(instance)
    }

    /// Apply each entry as an independent [`VariableStore::set`], stopping at the first failure.
    pub fn set_all<I, K, V>(&self, scope_id: &str, entries: I, local: bool) -> EngineResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<VariableValue>,
    {
        for (name, value) in entries {
            self.set(scope_id, name.as_ref(), value, local)?;
        }
        Ok(())
    }

    /// Delete the row for `name`; the historic snapshot stays behind.
    ///
    /// Returns `false` when no such variable is visible.
    pub fn remove(&self, scope_id: &str, name: &str, local: bool) -> EngineResult<bool> {
        let Some(instance) = self.locate(scope_id, name, local)? else {
            return Ok(false);
        };
        let last_value = self.registry.deserialize(&instance.type_name, &instance.fields)?;
        let removed = self.rows.delete(&instance.id)?;
        debug!(variable_id = %removed.id, scope_id = %removed.scope_id, name = %name, "variable removed");
        self.history.record_removed(&removed, &last_value, Utc::now())?;
        Ok(true)
    }

    fn locate(&self, scope_id: &str, name: &str, local: bool) -> EngineResult<Option<VariableInstance>> {
        for owner in self.search_path(scope_id, local)? {
            if let Some(instance) = self.rows.find(&owner, name)? {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }

    fn search_path(&self, scope_id: &str, local: bool) -> EngineResult<Vec<String>> {
        if local {
            let scope = self.scopes.get(scope_id)?;
            Ok(vec![scope.id])
        } else {
            self.scopes.resolve_visible(scope_id)
        }
    }

    fn hydrate(&self, mut instance: VariableInstance) -> EngineResult<VariableInstance> {
        instance.cached_value = Some(self.registry.deserialize(&instance.type_name, &instance.fields)?);
        Ok(instance)
    }
}

fn values_of(instances: IndexMap<String, VariableInstance>) -> IndexMap<String, VariableValue> {
    instances
        .into_iter()
        .filter_map(|(name, instance)| instance.cached_value.map(|value| (name, value)))
        .collect()
}
