//! Storage for per-definition info documents (localization overrides).

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;
use varscope_types::DefinitionInfo;

use crate::path_processing::expand_tilde;

/// Errors surfaced by definition info stores.
#[derive(Debug, Error)]
pub enum InfoStoreError {
    #[error("definition info I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("definition info serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("definition info store lock poisoned")]
    Poisoned,
}

/// Read/write access to info documents keyed by process definition id.
pub trait DefinitionInfoStore: Send + Sync {
    /// Fetch the info document for a definition, if one was ever saved.
    fn get_info(&self, definition_id: &str) -> Result<Option<DefinitionInfo>, InfoStoreError>;

    /// Replace the info document for a definition.
    fn save_info(&self, definition_id: &str, info: DefinitionInfo) -> Result<(), InfoStoreError>;
}

type InfoDocuments = IndexMap<String, DefinitionInfo>;

#[derive(Default)]
pub struct InMemoryDefinitionInfoStore {
    documents: Mutex<InfoDocuments>,
}

impl InMemoryDefinitionInfoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DefinitionInfoStore for InMemoryDefinitionInfoStore {
    fn get_info(&self, definition_id: &str) -> Result<Option<DefinitionInfo>, InfoStoreError> {
        Ok(lock(&self.documents)?.get(definition_id).cloned())
    }

    fn save_info(&self, definition_id: &str, info: DefinitionInfo) -> Result<(), InfoStoreError> {
        lock(&self.documents)?.insert(definition_id.to_string(), info);
        Ok(())
    }
}

/// JSON-file store holding every definition's info document in one map.
pub struct JsonDefinitionInfoStore {
    path: PathBuf,
    documents: Mutex<InfoDocuments>,
}

impl JsonDefinitionInfoStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, InfoStoreError> {
        let path = expand_tilde(&path.as_ref().to_string_lossy());
        let documents = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!(path = %path.display(), error = %error, "Failed to parse definition info file; starting empty");
                InfoDocuments::default()
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => InfoDocuments::default(),
            Err(error) => return Err(InfoStoreError::Io(error)),
        };
        Ok(Self {
            path,
            documents: Mutex::new(documents),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DefinitionInfoStore for JsonDefinitionInfoStore {
    fn get_info(&self, definition_id: &str) -> Result<Option<DefinitionInfo>, InfoStoreError> {
        Ok(lock(&self.documents)?.get(definition_id).cloned())
    }

    fn save_info(&self, definition_id: &str, info: DefinitionInfo) -> Result<(), InfoStoreError> {
        let mut documents = lock(&self.documents)?;
        documents.insert(definition_id.to_string(), info);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&*documents)?)?;
        Ok(())
    }
}

fn lock(documents: &Mutex<InfoDocuments>) -> Result<MutexGuard<'_, InfoDocuments>, InfoStoreError> {
    documents.lock().map_err(|_| InfoStoreError::Poisoned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unknown_definition_has_no_info() {
        let store = InMemoryDefinitionInfoStore::new();
        assert!(store.get_info("proc:1").unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous_document() {
        let store = InMemoryDefinitionInfoStore::new();
        let mut info = DefinitionInfo::default();
        info.change_localization_name("en", "stringVarId", "first");
        store.save_info("proc:1", info.clone()).unwrap();

        info.change_localization_name("en", "stringVarId", "second");
        store.save_info("proc:1", info).unwrap();

        let stored = store.get_info("proc:1").unwrap().unwrap();
        assert_eq!(stored.localization("en", "stringVarId").unwrap().name.as_deref(), Some("second"));
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("info.json");
        let store = JsonDefinitionInfoStore::new(&path).unwrap();

        let mut info = DefinitionInfo::default();
        info.change_localization_description("en-GB", "intVarId", "intVar 'en-GB' Description");
        store.save_info("proc:1", info.clone()).unwrap();

        let reloaded = JsonDefinitionInfoStore::new(&path).unwrap();
        assert_eq!(reloaded.get_info("proc:1").unwrap(), Some(info));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("info.json");
        fs::write(&path, "{ nope").unwrap();

        let store = JsonDefinitionInfoStore::new(&path).unwrap();
        assert!(store.get_info("proc:1").unwrap().is_none());
    }
}
