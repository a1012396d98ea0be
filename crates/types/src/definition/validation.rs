//! Validation helpers shared by deployment and the localization tooling.
//!
//! These routines ensure declared data objects are internally consistent and
//! that default literals can be converted into values of their declared type.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{DataObjectDefinition, DataObjectItemType, ProcessDefinition, SubProcessDefinition};
use crate::value::VariableValue;

static LOCALE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,8}([-_][A-Za-z0-9]{1,8})*$").expect("locale tag pattern is valid"));

/// Validate a locale tag such as `en`, `en-GB`, or `zh-Hant-TW`.
pub fn validate_locale_tag(tag: &str) -> Result<(), String> {
    if LOCALE_TAG.is_match(tag) {
        Ok(())
    } else {
        Err(format!("invalid locale tag '{}'", tag))
    }
}

/// Convert a default literal into a value of the declared type.
///
/// JSON `null` is accepted for every type. Strings are parsed for numeric,
/// boolean, and date types so hand-written definitions can quote literals.
pub fn coerce_default_value(item_type: DataObjectItemType, literal: &Value) -> Result<VariableValue, String> {
    if literal.is_null() {
        return Ok(VariableValue::Null);
    }

    match item_type {
        DataObjectItemType::String => match literal {
            Value::String(text) => Ok(VariableValue::String(text.clone())),
            Value::Array(_) | Value::Object(_) => Err("string data objects require a scalar default".to_string()),
            other => Ok(VariableValue::String(other.to_string())),
        },
        DataObjectItemType::Int => parse_integer(literal)
            .and_then(|number| i32::try_from(number).ok())
            .map(VariableValue::Integer)
            .ok_or_else(|| format!("default {} is not a valid int", literal)),
        DataObjectItemType::Long => parse_integer(literal)
            .map(VariableValue::Long)
            .ok_or_else(|| format!("default {} is not a valid long", literal)),
        DataObjectItemType::Double => match literal {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
        .map(VariableValue::Double)
        .ok_or_else(|| format!("default {} is not a valid double", literal)),
        DataObjectItemType::Boolean => match literal {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) => text.trim().parse::<bool>().ok(),
            _ => None,
        }
        .map(VariableValue::Boolean)
        .ok_or_else(|| format!("default {} is not a valid boolean", literal)),
        DataObjectItemType::Datetime => literal
            .as_str()
            .and_then(|text| DateTime::parse_from_rfc3339(text.trim()).ok())
            .map(|date| VariableValue::Date(date.with_timezone(&Utc)))
            .ok_or_else(|| format!("default {} is not an RFC 3339 datetime", literal)),
    }
}

fn parse_integer(literal: &Value) -> Option<i64> {
    match literal {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Validate a process definition before deployment.
///
/// The checks cover:
/// - A non-empty key.
/// - Unique data-object ids and names within each container.
/// - Unique sub-process ids across the whole definition.
/// - Default literals compatible with their declared types.
/// - Well-formed embedded locale tags.
pub fn validate_process_definition(definition: &ProcessDefinition) -> Result<(), String> {
    if definition.key.trim().is_empty() {
        return Err("process definition is missing the required 'key'".to_string());
    }

    validate_data_objects(&definition.data_objects).map_err(|error| format!("process '{}': {}", definition.key, error))?;

    let mut sub_process_ids = HashSet::new();
    validate_sub_processes(&definition.sub_processes, &mut sub_process_ids)
}

fn validate_sub_processes<'a>(sub_processes: &'a [SubProcessDefinition], seen: &mut HashSet<&'a str>) -> Result<(), String> {
    for sub in sub_processes {
        if sub.id.trim().is_empty() {
            return Err("sub-process is missing the required 'id'".to_string());
        }
        if !seen.insert(sub.id.as_str()) {
            return Err(format!("duplicate sub-process id detected: '{}'", sub.id));
        }
        validate_data_objects(&sub.data_objects).map_err(|error| format!("sub-process '{}': {}", sub.id, error))?;
        validate_sub_processes(&sub.sub_processes, seen)?;
    }
    Ok(())
}

fn validate_data_objects(data_objects: &[DataObjectDefinition]) -> Result<(), String> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();

    for data_object in data_objects {
        if data_object.id.trim().is_empty() || data_object.name.trim().is_empty() {
            return Err("data objects require both an 'id' and a 'name'".to_string());
        }
        if !ids.insert(data_object.id.as_str()) {
            return Err(format!("duplicate data object id '{}'", data_object.id));
        }
        if !names.insert(data_object.name.as_str()) {
            return Err(format!("duplicate data object name '{}'", data_object.name));
        }
        if let Some(default_value) = &data_object.default_value {
            coerce_default_value(data_object.item_type, default_value)
                .map_err(|error| format!("data object '{}': {}", data_object.id, error))?;
        }
        for locale in data_object.localizations.keys() {
            validate_locale_tag(locale).map_err(|error| format!("data object '{}': {}", data_object.id, error))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn data_object(id: &str, name: &str, item_type: DataObjectItemType) -> DataObjectDefinition {
        DataObjectDefinition {
            id: id.into(),
            name: name.into(),
            item_type,
            documentation: None,
            default_value: None,
            localizations: IndexMap::new(),
        }
    }

    fn definition(data_objects: Vec<DataObjectDefinition>) -> ProcessDefinition {
        ProcessDefinition {
            id: String::new(),
            key: "process".into(),
            name: None,
            version: 0,
            data_objects,
            sub_processes: Vec::new(),
        }
    }

    #[test]
    fn locale_tags_are_checked() {
        assert!(validate_locale_tag("en").is_ok());
        assert!(validate_locale_tag("en-GB").is_ok());
        assert!(validate_locale_tag("zh-Hant-TW").is_ok());
        assert!(validate_locale_tag("pt_BR").is_ok());
        assert!(validate_locale_tag("").is_err());
        assert!(validate_locale_tag("en GB").is_err());
    }

    #[test]
    fn coerces_quoted_literals() {
        assert_eq!(
            coerce_default_value(DataObjectItemType::Int, &json!("42")),
            Ok(VariableValue::Integer(42))
        );
        assert_eq!(
            coerce_default_value(DataObjectItemType::Boolean, &json!("true")),
            Ok(VariableValue::Boolean(true))
        );
        assert_eq!(
            coerce_default_value(DataObjectItemType::String, &json!(7)),
            Ok(VariableValue::String("7".into()))
        );
        assert!(matches!(
            coerce_default_value(DataObjectItemType::Datetime, &json!("2024-01-02T03:04:05Z")),
            Ok(VariableValue::Date(_))
        ));
        assert!(coerce_default_value(DataObjectItemType::Long, &Value::Null).expect("null").is_null());
    }

    #[test]
    fn rejects_out_of_range_int() {
        assert!(coerce_default_value(DataObjectItemType::Int, &json!(9_000_000_000_i64)).is_err());
        assert!(coerce_default_value(DataObjectItemType::Double, &json!([1.0])).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let definition = definition(vec![
            data_object("a", "shared", DataObjectItemType::String),
            data_object("b", "shared", DataObjectItemType::Int),
        ]);

        let error = validate_process_definition(&definition).expect_err("duplicate name");
        assert!(error.contains("duplicate data object name"));
    }

    #[test]
    fn rejects_duplicate_sub_process_ids() {
        let mut definition = definition(Vec::new());
        let sub = SubProcessDefinition {
            id: "sub".into(),
            name: None,
            data_objects: Vec::new(),
            sub_processes: Vec::new(),
        };
        definition.sub_processes = vec![sub.clone(), sub];

        let error = validate_process_definition(&definition).expect_err("duplicate sub-process");
        assert!(error.contains("duplicate sub-process id"));
    }

    #[test]
    fn rejects_incompatible_default() {
        let mut invalid = data_object("intVarId", "intVar", DataObjectItemType::Int);
        invalid.default_value = Some(json!("not a number"));

        let error = validate_process_definition(&definition(vec![invalid])).expect_err("bad default");
        assert!(error.contains("intVarId"));
    }

    #[test]
    fn rejects_missing_key() {
        let mut definition = definition(Vec::new());
        definition.key = " ".into();
        assert!(validate_process_definition(&definition).is_err());
    }
}
