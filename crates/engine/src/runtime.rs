//! Runtime facade wiring scopes, variables, history, definitions, and localization.
//!
//! The execution engine reports scope lifecycle events here and callers use
//! the accessors to reach the individual components.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use varscope_types::definition::validation::coerce_default_value;
use varscope_types::{HistoryLevel, ProcessDefinition, Scope, VariableValue};
use varscope_util::{
    DefinitionInfoStore, HistoricVariableStore, InMemoryDefinitionInfoStore, InMemoryHistoricVariableStore, InMemoryVariableRowStore,
    JsonDefinitionInfoStore, JsonHistoricVariableStore, VariableRowStore,
};

use crate::config::EngineConfig;
use crate::data_object::DataObjectView;
use crate::definition::{DefinitionCatalog, container_for};
use crate::error::{EngineError, EngineResult};
use crate::history::HistoricVariableLog;
use crate::localization::LocalizationOverlay;
use crate::parse_definition_file;
use crate::scope::ScopeTree;
use crate::store::VariableStore;
use crate::value_types::VariableTypeRegistry;

pub struct VariableRuntime {
    config: EngineConfig,
    scopes: Arc<ScopeTree>,
    registry: Arc<VariableTypeRegistry>,
    history: Arc<HistoricVariableLog>,
    store: Arc<VariableStore>,
    catalog: Arc<DefinitionCatalog>,
    overlay: Arc<LocalizationOverlay>,
    data_objects: DataObjectView,
}

impl VariableRuntime {
    /// Build a runtime with backends chosen by `config`.
    ///
    /// History and definition info use JSON files when their paths are set and
    /// in-memory stores otherwise; variable rows always live in memory.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let history_store: Arc<dyn HistoricVariableStore> = match &config.history_path {
            Some(path) => Arc::new(JsonHistoricVariableStore::new(Some(path.clone()))?),
            None => Arc::new(InMemoryHistoricVariableStore::new()),
        };
        let info_store: Arc<dyn DefinitionInfoStore> = match &config.definition_info_path {
            Some(path) => Arc::new(JsonDefinitionInfoStore::new(path)?),
            None => Arc::new(InMemoryDefinitionInfoStore::new()),
        };
        Ok(Self::with_stores(config, Arc::new(InMemoryVariableRowStore::new()), history_store, info_store))
    }

    /// In-memory runtime with default configuration.
    pub fn in_memory() -> Self {
        Self::with_stores(
            EngineConfig::default(),
            Arc::new(InMemoryVariableRowStore::new()),
            Arc::new(InMemoryHistoricVariableStore::new()),
            Arc::new(InMemoryDefinitionInfoStore::new()),
        )
    }

    pub fn with_stores(
        config: EngineConfig,
        rows: Arc<dyn VariableRowStore>,
        history_store: Arc<dyn HistoricVariableStore>,
        info_store: Arc<dyn DefinitionInfoStore>,
    ) -> Self {
        let scopes = Arc::new(ScopeTree::new());
        let registry = Arc::new(VariableTypeRegistry::with_builtin_types(config.max_inline_text_bytes));
        let history = Arc::new(HistoricVariableLog::new(history_store, config.history_level));
        let store = Arc::new(VariableStore::new(
            Arc::clone(&scopes),
            Arc::clone(&registry),
            rows,
            Arc::clone(&history),
        ));
        let catalog = Arc::new(DefinitionCatalog::new());
        let overlay = Arc::new(LocalizationOverlay::new(info_store));
        let data_objects = DataObjectView::new(Arc::clone(&scopes), Arc::clone(&store), Arc::clone(&catalog), Arc::clone(&overlay));

        Self {
            config,
            scopes,
            registry,
            history,
            store,
            catalog,
            overlay,
            data_objects,
        }
    }

    pub fn deploy(&self, definition: ProcessDefinition) -> EngineResult<Arc<ProcessDefinition>> {
        self.catalog.deploy(definition)
    }

    /// Parse every definition in a YAML or JSON file and deploy them in order.
    pub fn deploy_file(&self, path: impl AsRef<Path>) -> anyhow::Result<Vec<Arc<ProcessDefinition>>> {
        let definitions = parse_definition_file(path)?;
        let mut deployed = Vec::with_capacity(definitions.len());
        for definition in definitions {
            deployed.push(self.deploy(definition)?);
        }
        Ok(deployed)
    }

    /// Start an instance of the latest version of `definition_key`.
    ///
    /// Declared data objects are initialized first, then `variables` are
    /// written on the root scope, so a start variable that names a data
    /// object overwrites its default in place.
    pub fn start_process_instance<I, K, V>(&self, definition_key: &str, instance_id: &str, variables: I) -> EngineResult<Scope>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<VariableValue>,
    {
        let definition = self.catalog.latest_by_key(definition_key)?;
        let root = Scope::root(instance_id, Some(definition.id.clone()));
        self.on_scope_created(root.clone())?;
        self.store.set_all(&root.id, variables, true)?;
        info!(process_instance_id = %root.id, definition_id = %definition.id, "process instance started");
        Ok(root)
    }

    /// Register a scope and initialize the data objects its container declares.
    ///
    /// A child scope without a definition id inherits its parent's. Defaults
    /// are coerced and matched to a variable type before the scope is
    /// registered, so a rejected default leaves no scope behind.
    pub fn on_scope_created(&self, mut scope: Scope) -> EngineResult<()> {
        if scope.process_definition_id.is_none()
            && let Some(parent_id) = scope.parent_id.as_deref()
        {
            scope.process_definition_id = self.scopes.get(parent_id)?.process_definition_id;
        }
        let definition = scope
            .process_definition_id
            .as_deref()
            .map(|definition_id| self.catalog.get(definition_id))
            .transpose()?;

        let initial_values = match &definition {
            Some(definition) => initial_data_objects(definition, &scope)?,
            None => Vec::new(),
        };
        for (_, value) in &initial_values {
            self.registry.find_type_for_value(value)?;
        }

        let scope_id = scope.id.clone();
        self.scopes.insert(scope)?;
        if initial_values.is_empty() {
            return Ok(());
        }

        let data_objects = initial_values.len();
        self.store.set_all(&scope_id, initial_values, true)?;
        debug!(scope_id = %scope_id, data_objects, "data objects initialized");
        Ok(())
    }

    /// Forget a scope subtree. Variables and history are left untouched.
    pub fn on_scope_destroyed(&self, scope_id: &str) -> EngineResult<Vec<String>> {
        self.scopes.remove(scope_id)
    }

    pub fn current_history_level(&self) -> HistoryLevel {
        self.history.level()
    }

    /// Apply submitted form fields as global writes; explicit nulls are stored as null.
    pub fn submit_form_variables<I, K, V>(&self, scope_id: &str, entries: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<VariableValue>,
    {
        self.store.set_all(scope_id, entries, false)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn registry(&self) -> &VariableTypeRegistry {
        &self.registry
    }

    pub fn variables(&self) -> &VariableStore {
        &self.store
    }

    pub fn history(&self) -> &HistoricVariableLog {
        &self.history
    }

    pub fn definitions(&self) -> &DefinitionCatalog {
        &self.catalog
    }

    pub fn localization(&self) -> &LocalizationOverlay {
        &self.overlay
    }

    pub fn data_objects(&self) -> &DataObjectView {
        &self.data_objects
    }
}

/// Typed defaults for the data objects declared by the container of `scope`.
fn initial_data_objects(definition: &ProcessDefinition, scope: &Scope) -> EngineResult<Vec<(String, VariableValue)>> {
    let Some(declarations) = container_for(definition, scope) else {
        return Ok(Vec::new());
    };
    declarations
        .iter()
        .map(|declaration| {
            let literal = declaration.default_value.clone().unwrap_or_default();
            let value = coerce_default_value(declaration.item_type, &literal).map_err(|reason| EngineError::InvalidDefinition {
                key: definition.key.clone(),
                reason: format!("data object '{}': {reason}", declaration.id),
            })?;
            Ok((declaration.name.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use varscope_types::{DataObjectDefinition, DataObjectItemType};

    fn definition() -> ProcessDefinition {
        ProcessDefinition {
            id: String::new(),
            key: "simple".into(),
            name: None,
            version: 0,
            data_objects: vec![DataObjectDefinition {
                id: "countId".into(),
                name: "count".into(),
                item_type: DataObjectItemType::Int,
                documentation: None,
                default_value: Some(json!(5)),
                localizations: Default::default(),
            }],
            sub_processes: Vec::new(),
        }
    }

    #[test]
    fn start_variables_overwrite_defaults_in_place() {
        let runtime = VariableRuntime::in_memory();
        runtime.deploy(definition()).unwrap();

        let root = runtime.start_process_instance("simple", "pi-1", Vec::<(String, VariableValue)>::new()).unwrap();
        let declared = runtime.variables().get_instance(&root.id, "count", true).unwrap().unwrap();
        assert_eq!(declared.value(), Some(&VariableValue::Integer(5)));

        let other = runtime.start_process_instance("simple", "pi-2", [("count", 9)]).unwrap();
        assert_eq!(runtime.variables().get(&other.id, "count", true).unwrap(), Some(VariableValue::Integer(9)));
    }

    #[test]
    fn unknown_definition_key_fails_start() {
        let runtime = VariableRuntime::in_memory();
        let error = runtime
            .start_process_instance("missing", "pi-1", Vec::<(String, VariableValue)>::new())
            .unwrap_err();
        assert!(matches!(error, EngineError::DefinitionNotFound(_)));
        assert!(runtime.scopes().is_empty());
    }

    #[test]
    fn invalid_defaults_are_reported_before_any_write() {
        let mut broken = definition();
        broken.id = "simple:1".into();
        broken.data_objects[0].default_value = Some(json!("five"));
        let root = Scope::root("pi-1", Some(broken.id.clone()));

        let error = initial_data_objects(&broken, &root).unwrap_err();
        assert!(matches!(error, EngineError::InvalidDefinition { reason, .. } if reason.contains("countId")));
    }

    #[test]
    fn rejected_defaults_leave_no_scope_behind() {
        let runtime = VariableRuntime::in_memory();
        let deployed = runtime.deploy(definition()).unwrap();
        runtime.registry().remove_type("integer");

        let root = Scope::root("pi-1", Some(deployed.id.clone()));
        let error = runtime.on_scope_created(root).unwrap_err();

        assert!(matches!(error, EngineError::NoAcceptingType { kind: "integer" }));
        assert!(!runtime.scopes().contains("pi-1"));
        assert!(runtime.history().find(&varscope_util::HistoricVariableQuery::new()).unwrap().is_empty());
    }

    #[test]
    fn plain_child_scopes_inherit_root_data_objects() {
        let runtime = VariableRuntime::in_memory();
        runtime.deploy(definition()).unwrap();
        let root = runtime.start_process_instance("simple", "pi-1", [("count", 7)]).unwrap();

        runtime.on_scope_created(Scope::child_of(&root, "exec-2", None)).unwrap();

        assert_eq!(runtime.variables().get("exec-2", "count", true).unwrap(), None);
        assert_eq!(runtime.variables().get("exec-2", "count", false).unwrap(), Some(VariableValue::Integer(7)));
    }

    #[test]
    fn destroyed_scopes_keep_their_variables_history() {
        let runtime = VariableRuntime::in_memory();
        runtime.deploy(definition()).unwrap();
        let root = runtime.start_process_instance("simple", "pi-1", [("extra", "x")]).unwrap();

        let removed = runtime.on_scope_destroyed(&root.id).unwrap();
        assert_eq!(removed, vec!["pi-1"]);
        assert_eq!(runtime.current_history_level(), HistoryLevel::Audit);
        assert_eq!(
            runtime
                .history()
                .count(&varscope_util::HistoricVariableQuery::new().process_instance_id("pi-1"))
                .unwrap(),
            2
        );
    }
}
