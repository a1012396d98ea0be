use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde_json::{Value as JsonValue, json};
use tracing::{Level, debug, warn};
use varscope_engine::{DataObject, EngineConfig, HistoricVariableLog, VariableRuntime};
use varscope_types::{
    DataObjectDefinition, DefinitionInfo, HistoricVariableInstance, LocalizationEntry, ProcessDefinition, Scope, SubProcessDefinition,
    VariableValue,
};
use varscope_util::{HistoricVariableQuery, JsonHistoricVariableStore};

#[derive(Debug, Parser)]
#[command(name = "varscope", version, about = "Inspect process definitions and their localized data objects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a definition file and list the data objects each container declares.
    Check {
        /// Path to a YAML or JSON definition file
        definition: PathBuf,
    },
    /// Start an instance in memory and print its data objects.
    DataObjects {
        /// Path to a YAML or JSON definition file
        #[arg(long, short = 'd')]
        definition: PathBuf,
        /// Definition key to start; defaults to the first definition in the file
        #[arg(long)]
        key: Option<String>,
        /// Start variable as NAME=VALUE; VALUE is read as JSON and falls back to a string
        #[arg(long = "var", value_name = "NAME=VALUE")]
        variables: Vec<String>,
        /// Open a child scope for this sub-process and read from there
        #[arg(long)]
        activity: Option<String>,
        /// Locale used to resolve names and descriptions
        #[arg(long)]
        locale: Option<String>,
        /// Fall back from a regional locale to its language
        #[arg(long)]
        fallback: bool,
        /// Only data objects declared by the read scope itself
        #[arg(long)]
        local: bool,
        /// JSON definition info document with locale overrides
        #[arg(long)]
        localizations: Option<PathBuf>,
    },
    /// Query the configured JSON history file.
    History {
        #[arg(long)]
        process_instance: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Hide variables that have since been removed
        #[arg(long)]
        exclude_removed: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = EngineConfig::load()?;

    match cli.command {
        Command::Check { definition } => run_check(&definition),
        Command::DataObjects {
            definition,
            key,
            variables,
            activity,
            locale,
            fallback,
            local,
            localizations,
        } => {
            let locale = locale.or_else(|| config.default_locale.clone());
            let request = DataObjectRequest {
                definition_path: &definition,
                key: key.as_deref(),
                variables: &variables,
                activity: activity.as_deref(),
                locale: locale.as_deref(),
                fallback,
                local,
                localizations: localizations.as_deref(),
            };
            run_data_objects(config, &request)
        }
        Command::History {
            process_instance,
            name,
            exclude_removed,
        } => run_history(&config, process_instance, name, exclude_removed),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_check(definition_path: &Path) -> Result<()> {
    let runtime = VariableRuntime::in_memory();
    let deployed = runtime.deploy_file(definition_path)?;

    let summary: Vec<JsonValue> = deployed
        .iter()
        .map(|definition| {
            let mut containers = serde_json::Map::new();
            containers.insert(
                "process".into(),
                json!(definition.data_objects.iter().map(|data_object| &data_object.name).collect::<Vec<_>>()),
            );
            let mut pending: Vec<_> = definition.sub_processes.iter().collect();
            while let Some(sub_process) = pending.pop() {
                containers.insert(
                    sub_process.id.clone(),
                    json!(sub_process.data_objects.iter().map(|data_object| &data_object.name).collect::<Vec<_>>()),
                );
                pending.extend(sub_process.sub_processes.iter());
            }
            json!({
                "id": definition.id,
                "key": definition.key,
                "version": definition.version,
                "data_objects": containers,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

struct DataObjectRequest<'a> {
    definition_path: &'a Path,
    key: Option<&'a str>,
    variables: &'a [String],
    activity: Option<&'a str>,
    locale: Option<&'a str>,
    fallback: bool,
    local: bool,
    localizations: Option<&'a Path>,
}

fn run_data_objects(config: EngineConfig, request: &DataObjectRequest<'_>) -> Result<()> {
    let runtime = VariableRuntime::new(config)?;
    let deployed = runtime.deploy_file(request.definition_path)?;
    let definition = match request.key {
        Some(key) => runtime.definitions().latest_by_key(key)?,
        None => deployed
            .first()
            .cloned()
            .with_context(|| format!("No definitions found in {}", request.definition_path.display()))?,
    };

    if let Some(path) = request.localizations {
        let info = load_definition_info(path)?;
        for entry in unmatched_overrides(&definition, &info) {
            warn!(
                locale = %entry.locale,
                definition_key = %entry.definition_key,
                "Localization override does not match any declared data object"
            );
        }
        runtime.localization().save_info(&definition.id, info)?;
    }

    let variables = request
        .variables
        .iter()
        .map(|assignment| parse_assignment(assignment))
        .collect::<Result<Vec<_>>>()?;
    let root = runtime.start_process_instance(&definition.key, "cli-instance", variables)?;

    let read_scope_id = match request.activity {
        Some(activity_id) => {
            let child = Scope::child_of(&root, format!("{}-{activity_id}", root.id), Some(activity_id.to_string()));
            let child_id = child.id.clone();
            runtime.on_scope_created(child)?;
            child_id
        }
        None => root.id.clone(),
    };
    debug!(scope_id = %read_scope_id, locale = ?request.locale, fallback = request.fallback, "reading data objects");

    let view = runtime.data_objects();
    let data_objects = if request.local {
        view.get_data_objects_local(&read_scope_id, None, request.locale, request.fallback)?
    } else {
        view.get_data_objects(&read_scope_id, None, request.locale, request.fallback)?
    };

    let rendered: IndexMap<&str, JsonValue> = data_objects.iter().map(|(name, data_object)| (name.as_str(), render(data_object))).collect();
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

fn run_history(config: &EngineConfig, process_instance: Option<String>, name: Option<String>, exclude_removed: bool) -> Result<()> {
    let mut query = HistoricVariableQuery::new();
    if exclude_removed {
        query = query.exclude_removed();
    }
    if let Some(process_instance) = process_instance {
        query = query.process_instance_id(process_instance);
    }
    if let Some(name) = name {
        query = query.variable_name(name);
    }

    let records: Vec<JsonValue> = query_history(config, &query)?
        .into_iter()
        .map(|record| {
            json!({
                "id": record.id,
                "name": record.name,
                "scope_id": record.scope_id,
                "process_instance_id": record.process_instance_id,
                "type": record.type_name,
                "value": record.value.to_json(),
                "created": record.create_time,
                "last_updated": record.last_updated_time,
                "removed": record.removed_time,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Query the configured history file at the configured level; `none` reads as empty.
fn query_history(config: &EngineConfig, query: &HistoricVariableQuery) -> Result<Vec<HistoricVariableInstance>> {
    let Some(history_path) = config.history_path.clone() else {
        bail!("No history_path configured; set it in the engine config to query history");
    };
    let store = JsonHistoricVariableStore::new(history_path)?;
    let log = HistoricVariableLog::new(Arc::new(store), config.history_level);
    Ok(log.find(query)?)
}

/// Override entries whose key names no data object declared anywhere in `definition`.
fn unmatched_overrides(definition: &ProcessDefinition, info: &DefinitionInfo) -> Vec<LocalizationEntry> {
    fn collect<'a>(declarations: &'a [DataObjectDefinition], sub_processes: &'a [SubProcessDefinition], keys: &mut HashSet<&'a str>) {
        keys.extend(declarations.iter().map(|declaration| declaration.id.as_str()));
        for sub_process in sub_processes {
            collect(&sub_process.data_objects, &sub_process.sub_processes, keys);
        }
    }

    let mut declared_keys = HashSet::new();
    collect(&definition.data_objects, &definition.sub_processes, &mut declared_keys);
    info.entries()
        .into_iter()
        .filter(|entry| !declared_keys.contains(entry.definition_key.as_str()))
        .collect()
}

fn render(data_object: &DataObject) -> JsonValue {
    json!({
        "id": data_object.id,
        "localized_name": data_object.localized_name,
        "description": data_object.description,
        "type": data_object.item_type.as_str(),
        "value": data_object.value.to_json(),
        "definition_key": data_object.data_object_definition_key,
        "process_instance_id": data_object.process_instance_id,
        "execution_id": data_object.execution_id,
    })
}

fn load_definition_info(path: &Path) -> Result<DefinitionInfo> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read localizations: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse localizations: {}", path.display()))
}

fn parse_assignment(assignment: &str) -> Result<(String, VariableValue)> {
    let Some((name, raw_value)) = assignment.split_once('=') else {
        bail!("Invalid variable '{assignment}': expected NAME=VALUE");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid variable '{assignment}': name is empty");
    }
    let value = serde_json::from_str::<JsonValue>(raw_value)
        .map(VariableValue::from_json)
        .unwrap_or_else(|_| VariableValue::from(raw_value));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_parse_json_then_text() {
        assert_eq!(parse_assignment("count=12").unwrap(), ("count".into(), VariableValue::Integer(12)));
        assert_eq!(parse_assignment("flag=true").unwrap(), ("flag".into(), VariableValue::Boolean(true)));
        assert_eq!(parse_assignment("empty=null").unwrap(), ("empty".into(), VariableValue::Null));
        assert_eq!(parse_assignment("drink=coca-cola").unwrap(), ("drink".into(), VariableValue::from("coca-cola")));
        assert_eq!(parse_assignment("quoted=\"a=b\"").unwrap(), ("quoted".into(), VariableValue::from("a=b")));
    }

    #[test]
    fn assignments_need_a_name() {
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment(" =3").is_err());
    }

    #[test]
    fn cli_parses_data_object_flags() {
        let cli = Cli::try_parse_from([
            "varscope",
            "data-objects",
            "--definition",
            "order.yaml",
            "--var",
            "customer=acme",
            "--locale",
            "en-GB",
            "--fallback",
        ])
        .unwrap();
        match cli.command {
            Command::DataObjects {
                variables, locale, fallback, local, ..
            } => {
                assert_eq!(variables, vec!["customer=acme"]);
                assert_eq!(locale.as_deref(), Some("en-GB"));
                assert!(fallback);
                assert!(!local);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn history_queries_honor_the_configured_level() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig {
            history_path: Some(temp_dir.path().join("history.json")),
            ..EngineConfig::default()
        };

        let runtime = VariableRuntime::new(config.clone()).unwrap();
        runtime.on_scope_created(Scope::root("pi-1", None)).unwrap();
        runtime.variables().set("pi-1", "customer", "acme", true).unwrap();
        drop(runtime);

        let query = HistoricVariableQuery::new().process_instance_id("pi-1");
        assert_eq!(query_history(&config, &query).unwrap().len(), 1);

        config.history_level = varscope_types::HistoryLevel::None;
        assert!(query_history(&config, &query).unwrap().is_empty());
    }

    #[test]
    fn history_requires_a_configured_path() {
        let error = query_history(&EngineConfig::default(), &HistoricVariableQuery::new()).unwrap_err();
        assert!(error.to_string().contains("history_path"));
    }

    #[test]
    fn overrides_for_undeclared_keys_are_reported() {
        let definition: ProcessDefinition = serde_json::from_value(json!({
            "key": "order",
            "data_objects": [{ "id": "customerId", "name": "customer", "type": "string" }],
            "sub_processes": [{
                "id": "shipping",
                "data_objects": [{ "id": "addressId", "name": "address", "type": "string" }]
            }]
        }))
        .unwrap();
        let mut info = DefinitionInfo::default();
        info.change_localization_name("en", "customerId", "Customer");
        info.change_localization_name("en", "addressId", "Address");
        info.change_localization_description("fr", "typoId", "Inconnu");

        let unmatched = unmatched_overrides(&definition, &info);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].locale, "fr");
        assert_eq!(unmatched[0].definition_key, "typoId");
    }

    #[test]
    fn localizations_file_is_loaded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("info.json");
        fs::write(
            &path,
            r#"{ "localizations": { "en": { "customerId": { "name": "Customer", "description": "Who ordered" } } } }"#,
        )
        .unwrap();

        let info = load_definition_info(&path).unwrap();
        let text = info.localization("en", "customerId").unwrap();
        assert_eq!(text.name.as_deref(), Some("Customer"));
    }
}
