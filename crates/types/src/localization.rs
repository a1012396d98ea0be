//! Locale-keyed display metadata for data-object declarations.
//!
//! A [`DefinitionInfo`] document is attached to a deployed process definition
//! and carries one [`LocalizedText`] per `(locale, definition key)` pair. It
//! overrides whatever localizations were embedded at authoring time.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Localized name and description; either half may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flattened `(locale, definition key)` row, as exposed to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationEntry {
    pub locale: String,
    pub definition_key: String,
    #[serde(flatten)]
    pub text: LocalizedText,
}

/// Per-definition info document holding localization overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionInfo {
    /// `locale -> definition key -> text`, in insertion order.
    #[serde(default)]
    pub localizations: IndexMap<String, IndexMap<String, LocalizedText>>,
}

impl DefinitionInfo {
    /// Look up the entry stored for an exact `(locale, definition key)` pair.
    pub fn localization(&self, locale: &str, definition_key: &str) -> Option<&LocalizedText> {
        self.localizations.get(locale)?.get(definition_key)
    }

    /// Set the localized name for `(locale, definition key)`.
    pub fn change_localization_name(&mut self, locale: &str, definition_key: &str, name: impl Into<String>) {
        self.entry_mut(locale, definition_key).name = Some(name.into());
    }

    /// Set the localized description for `(locale, definition key)`.
    pub fn change_localization_description(&mut self, locale: &str, definition_key: &str, description: impl Into<String>) {
        self.entry_mut(locale, definition_key).description = Some(description.into());
    }

    /// Flatten the document into rows.
    pub fn entries(&self) -> Vec<LocalizationEntry> {
        self.localizations
            .iter()
            .flat_map(|(locale, by_key)| {
                by_key.iter().map(move |(definition_key, text)| LocalizationEntry {
                    locale: locale.clone(),
                    definition_key: definition_key.clone(),
                    text: text.clone(),
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.localizations.values().all(IndexMap::is_empty)
    }

    fn entry_mut(&mut self, locale: &str, definition_key: &str) -> &mut LocalizedText {
        self.localizations
            .entry(locale.to_string())
            .or_default()
            .entry(definition_key.to_string())
            .or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_description_are_set_independently() {
        let mut info = DefinitionInfo::default();
        assert!(info.is_empty());

        info.change_localization_name("en-US", "stringVarId", "stringVar 'en-US' Name");
        let text = info.localization("en-US", "stringVarId").expect("entry");
        assert_eq!(text.name.as_deref(), Some("stringVar 'en-US' Name"));
        assert!(text.description.is_none());

        info.change_localization_description("en-US", "stringVarId", "stringVar 'en-US' Description");
        let text = info.localization("en-US", "stringVarId").expect("entry");
        assert_eq!(text.description.as_deref(), Some("stringVar 'en-US' Description"));
    }

    #[test]
    fn matching_is_exact() {
        let mut info = DefinitionInfo::default();
        info.change_localization_name("en", "key", "en name");

        assert!(info.localization("EN", "key").is_none());
        assert!(info.localization("en-GB", "key").is_none());
        assert!(info.localization("en", "other").is_none());
    }

    #[test]
    fn flattens_entries() {
        let mut info = DefinitionInfo::default();
        info.change_localization_name("en", "a", "A");
        info.change_localization_name("fr", "a", "Ah");
        info.change_localization_description("fr", "b", "Bee");

        let entries = info.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].locale, "fr");
        assert_eq!(entries[2].definition_key, "b");
        assert_eq!(entries[2].text.description.as_deref(), Some("Bee"));
    }
}
