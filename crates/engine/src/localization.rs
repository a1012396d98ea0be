//! Locale-aware display names and descriptions for data objects.
//!
//! Resolution runs a fixed list of strategies and takes the first hit:
//! the exact locale in the definition's info document, the exact locale in
//! the localizations embedded at authoring time, then (only with `fallback`)
//! the bare language tag in the same two places, and finally the
//! definition's own name and documentation.

use std::sync::Arc;

use tracing::debug;
use varscope_types::definition::validation::validate_locale_tag;
use varscope_types::{DataObjectDefinition, DefinitionInfo, LocalizedText};
use varscope_util::{DefinitionInfoStore, InMemoryDefinitionInfoStore};

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextField {
    Name,
    Description,
}

impl TextField {
    fn pick(self, text: &LocalizedText) -> Option<String> {
        match self {
            Self::Name => text.name.clone(),
            Self::Description => text.description.clone(),
        }
    }
}

struct Lookup<'a> {
    info: &'a DefinitionInfo,
    data_object: &'a DataObjectDefinition,
    locale: Option<&'a str>,
    fallback: bool,
}

impl Lookup<'_> {
    fn in_info(&self, locale: &str, field: TextField) -> Option<String> {
        self.info.localization(locale, &self.data_object.id).and_then(|text| field.pick(text))
    }

    fn in_definition(&self, locale: &str, field: TextField) -> Option<String> {
        self.data_object.localizations.get(locale).and_then(|text| field.pick(text))
    }
}

type Strategy = fn(&Lookup<'_>, TextField) -> Option<String>;

const STRATEGIES: [Strategy; 4] = [exact_info, exact_definition, language_only, definition_default];

fn exact_info(lookup: &Lookup<'_>, field: TextField) -> Option<String> {
    lookup.in_info(lookup.locale?, field)
}

fn exact_definition(lookup: &Lookup<'_>, field: TextField) -> Option<String> {
    lookup.in_definition(lookup.locale?, field)
}

fn language_only(lookup: &Lookup<'_>, field: TextField) -> Option<String> {
    if !lookup.fallback {
        return None;
    }
    let language = language_tag(lookup.locale?)?;
    lookup
        .in_info(language, field)
        .or_else(|| lookup.in_definition(language, field))
}

fn definition_default(lookup: &Lookup<'_>, field: TextField) -> Option<String> {
    match field {
        TextField::Name => Some(lookup.data_object.name.clone()),
        TextField::Description => lookup.data_object.documentation.clone(),
    }
}

/// Language part of a region- or script-qualified tag; `None` for bare tags.
pub fn language_tag(locale: &str) -> Option<&str> {
    let split = locale.find(['-', '_'])?;
    let language = &locale[..split];
    (!language.is_empty()).then_some(language)
}

/// Reads and writes localization overrides and resolves them against definitions.
pub struct LocalizationOverlay {
    info_store: Arc<dyn DefinitionInfoStore>,
}

impl Default for LocalizationOverlay {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryDefinitionInfoStore::new()))
    }
}

impl LocalizationOverlay {
    pub fn new(info_store: Arc<dyn DefinitionInfoStore>) -> Self {
        Self { info_store }
    }

    /// Info document of a definition; empty when none was saved.
    pub fn info(&self, process_definition_id: &str) -> EngineResult<DefinitionInfo> {
        Ok(self.info_store.get_info(process_definition_id)?.unwrap_or_default())
    }

    /// Persist an info document after checking its locale tags.
    pub fn save_info(&self, process_definition_id: &str, info: DefinitionInfo) -> EngineResult<()> {
        for locale in info.localizations.keys() {
            validate_locale_tag(locale).map_err(|_| EngineError::InvalidLocale(locale.clone()))?;
        }
        debug!(
            process_definition_id = %process_definition_id,
            locales = info.localizations.len(),
            "definition info saved"
        );
        Ok(self.info_store.save_info(process_definition_id, info)?)
    }

    pub fn change_localization_name(&self, process_definition_id: &str, locale: &str, definition_key: &str, name: &str) -> EngineResult<()> {
        let mut info = self.info(process_definition_id)?;
        info.change_localization_name(locale, definition_key, name);
        self.save_info(process_definition_id, info)
    }

    pub fn change_localization_description(
        &self,
        process_definition_id: &str,
        locale: &str,
        definition_key: &str,
        description: &str,
    ) -> EngineResult<()> {
        let mut info = self.info(process_definition_id)?;
        info.change_localization_description(locale, definition_key, description);
        self.save_info(process_definition_id, info)
    }

    pub fn resolve_name(
        &self,
        process_definition_id: &str,
        data_object: &DataObjectDefinition,
        locale: Option<&str>,
        fallback: bool,
    ) -> EngineResult<String> {
        let info = self.info(process_definition_id)?;
        let name = resolve_field(&info, data_object, locale, fallback, TextField::Name);
        Ok(name.unwrap_or_else(|| data_object.name.clone()))
    }

    pub fn resolve_description(
        &self,
        process_definition_id: &str,
        data_object: &DataObjectDefinition,
        locale: Option<&str>,
        fallback: bool,
    ) -> EngineResult<Option<String>> {
        let info = self.info(process_definition_id)?;
        Ok(resolve_field(&info, data_object, locale, fallback, TextField::Description))
    }

    /// Resolve name and description against an already loaded info document.
    pub fn resolve_with(info: &DefinitionInfo, data_object: &DataObjectDefinition, locale: Option<&str>, fallback: bool) -> LocalizedText {
        LocalizedText {
            name: resolve_field(info, data_object, locale, fallback, TextField::Name),
            description: resolve_field(info, data_object, locale, fallback, TextField::Description),
        }
    }
}

fn resolve_field(
    info: &DefinitionInfo,
    data_object: &DataObjectDefinition,
    locale: Option<&str>,
    fallback: bool,
    field: TextField,
) -> Option<String> {
    let lookup = Lookup {
        info,
        data_object,
        locale,
        fallback,
    };
    STRATEGIES.iter().find_map(|strategy| strategy(&lookup, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use varscope_types::DataObjectItemType;

    fn string_var() -> DataObjectDefinition {
        DataObjectDefinition {
            id: "stringVarId".into(),
            name: "StringTest123".into(),
            item_type: DataObjectItemType::String,
            documentation: Some("default description".into()),
            default_value: None,
            localizations: indexmap! {
                "es".to_string() => LocalizedText {
                    name: Some("Nombre Variable".into()),
                    description: Some("Descripcion Variable".into()),
                },
            },
        }
    }

    fn overlay() -> LocalizationOverlay {
        let overlay = LocalizationOverlay::default();
        for locale in ["en-US", "en-AU", "en"] {
            overlay
                .change_localization_name("proc:1", locale, "stringVarId", &format!("stringVar '{locale}' Name"))
                .unwrap();
        }
        overlay
    }

    #[test]
    fn strips_only_with_fallback() {
        let overlay = overlay();
        let data_object = string_var();

        assert_eq!(
            overlay.resolve_name("proc:1", &data_object, Some("en-GB"), true).unwrap(),
            overlay.resolve_name("proc:1", &data_object, Some("en"), true).unwrap()
        );
        assert_eq!(overlay.resolve_name("proc:1", &data_object, Some("en-GB"), false).unwrap(), "StringTest123");
        assert_eq!(overlay.resolve_name("proc:1", &data_object, Some("en-AU"), false).unwrap(), "stringVar 'en-AU' Name");
    }

    #[test]
    fn embedded_localizations_apply_when_info_is_silent() {
        let overlay = overlay();
        let data_object = string_var();

        assert_eq!(overlay.resolve_name("proc:1", &data_object, Some("es"), false).unwrap(), "Nombre Variable");
        assert_eq!(
            overlay.resolve_description("proc:1", &data_object, Some("es"), false).unwrap().as_deref(),
            Some("Descripcion Variable")
        );
    }

    #[test]
    fn info_overrides_embedded_localizations() {
        let overlay = overlay();
        overlay
            .change_localization_name("proc:1", "es", "stringVarId", "Nombre sobrescrito")
            .unwrap();
        let data_object = string_var();

        assert_eq!(overlay.resolve_name("proc:1", &data_object, Some("es"), false).unwrap(), "Nombre sobrescrito");
        // The override only carries a name; the description still comes from the definition.
        assert_eq!(
            overlay.resolve_description("proc:1", &data_object, Some("es"), false).unwrap().as_deref(),
            Some("Descripcion Variable")
        );
    }

    #[test]
    fn bare_locales_without_entries_use_defaults() {
        let overlay = overlay();
        let data_object = string_var();

        assert_eq!(overlay.resolve_name("proc:1", &data_object, Some("it"), true).unwrap(), "StringTest123");
        assert_eq!(overlay.resolve_name("proc:1", &data_object, None, true).unwrap(), "StringTest123");
        assert_eq!(
            overlay.resolve_description("proc:1", &data_object, Some("ja-JA"), true).unwrap().as_deref(),
            Some("default description")
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let overlay = overlay();
        assert_eq!(overlay.resolve_name("proc:1", &string_var(), Some("EN-us"), false).unwrap(), "StringTest123");
    }

    #[test]
    fn rejects_malformed_locale_tags() {
        let overlay = LocalizationOverlay::default();
        let error = overlay.change_localization_name("proc:1", "not a locale", "stringVarId", "x").unwrap_err();
        assert!(matches!(error, EngineError::InvalidLocale(tag) if tag == "not a locale"));
        assert!(overlay.info("proc:1").unwrap().is_empty());
    }

    #[test]
    fn language_tag_splits_on_first_separator() {
        assert_eq!(language_tag("en-GB"), Some("en"));
        assert_eq!(language_tag("zh_Hant_TW"), Some("zh"));
        assert_eq!(language_tag("it"), None);
        assert_eq!(language_tag("-GB"), None);
    }
}
