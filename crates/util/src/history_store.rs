//! Persistence backends for historic variable snapshots.
//!
//! Exposes the [`HistoricVariableStore`] abstraction used by the engine's
//! audit log together with an in-memory backend and a JSON-file backend that
//! follows the usual config-directory conventions (tilde expansion, env
//! override, config directory fallback).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;
use varscope_types::HistoricVariableInstance;

use crate::path_processing::{default_config_dir, expand_tilde};

/// Environment variable controlling the history file location.
pub const HISTORY_PATH_ENV: &str = "VARSCOPE_HISTORY_PATH";

/// Default filename for the persisted history store.
pub const HISTORY_FILE_NAME: &str = "history.json";

/// Errors surfaced by history store operations.
#[derive(Debug, Error)]
pub enum HistoryStoreError {
    /// I/O failure while reading or writing the history file.
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization failure.
    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A writer panicked while holding the store lock.
    #[error("history store lock poisoned")]
    Poisoned,
}

/// Filter applied to historic variable lookups; unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoricVariableQuery {
    pub process_instance_id: Option<String>,
    pub scope_id: Option<String>,
    pub variable_name: Option<String>,
    pub variable_id: Option<Uuid>,
    /// When `true`, snapshots of removed variables are excluded.
    pub exclude_removed: bool,
}

impl HistoricVariableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_instance_id(mut self, process_instance_id: impl Into<String>) -> Self {
        self.process_instance_id = Some(process_instance_id.into());
        self
    }

    pub fn scope_id(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn variable_name(mut self, variable_name: impl Into<String>) -> Self {
        self.variable_name = Some(variable_name.into());
        self
    }

    pub fn variable_id(mut self, variable_id: Uuid) -> Self {
        self.variable_id = Some(variable_id);
        self
    }

    pub fn exclude_removed(mut self) -> Self {
        self.exclude_removed = true;
        self
    }

    /// Returns `true` when `record` satisfies every populated filter.
    pub fn matches(&self, record: &HistoricVariableInstance) -> bool {
        self.process_instance_id
            .as_ref()
            .is_none_or(|expected| *expected == record.process_instance_id)
            && self.scope_id.as_ref().is_none_or(|expected| *expected == record.scope_id)
            && self.variable_name.as_ref().is_none_or(|expected| *expected == record.name)
            && self.variable_id.is_none_or(|expected| expected == record.id)
            && !(self.exclude_removed && record.is_removed())
    }
}

/// One snapshot per variable identity, in first-recorded order.
#[derive(Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    entries: IndexMap<Uuid, HistoricVariableInstance>,
}

impl HistoryFile {
    fn get(&self, id: &Uuid) -> Option<HistoricVariableInstance> {
        self.entries.get(id).cloned()
    }

    fn upsert(&mut self, record: HistoricVariableInstance) {
        self.entries.insert(record.id, record);
    }

    fn find(&self, query: &HistoricVariableQuery) -> Vec<HistoricVariableInstance> {
        self.entries.values().filter(|record| query.matches(record)).cloned().collect()
    }
}

/// Shared trait implemented by historic variable persistence backends.
pub trait HistoricVariableStore: Send + Sync {
    /// Retrieve the snapshot recorded for a variable identity.
    fn get(&self, id: &Uuid) -> Result<Option<HistoricVariableInstance>, HistoryStoreError>;

    /// Insert or overwrite the snapshot keyed by `record.id`.
    fn upsert(&self, record: HistoricVariableInstance) -> Result<(), HistoryStoreError>;

    /// List snapshots matching `query`, at most one per variable identity.
    fn find(&self, query: &HistoricVariableQuery) -> Result<Vec<HistoricVariableInstance>, HistoryStoreError>;

    /// Count snapshots matching `query`.
    fn count(&self, query: &HistoricVariableQuery) -> Result<usize, HistoryStoreError> {
        Ok(self.find(query)?.len())
    }
}

/// JSON-backed history store persisted on disk.
pub struct JsonHistoricVariableStore {
    path: PathBuf,
    entries: Mutex<HistoryFile>,
}

impl JsonHistoricVariableStore {
    /// Create a new store at the provided path (or the default path when omitted).
    pub fn new<P: Into<Option<PathBuf>>>(path: P) -> Result<Self, HistoryStoreError> {
        let resolved_path = match path.into() {
            Some(path) => expand_tilde(&path.to_string_lossy()),
            None => default_history_path(),
        };

        let file = load_history_file(&resolved_path)?;
        Ok(Self {
            path: resolved_path,
            entries: Mutex::new(file),
        })
    }

    /// Access the underlying history path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, HistoryFile>, HistoryStoreError> {
        self.entries.lock().map_err(|_| HistoryStoreError::Poisoned)
    }

    fn save_locked(&self, history_file: &HistoryFile) -> Result<(), HistoryStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(history_file)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl HistoricVariableStore for JsonHistoricVariableStore {
    fn get(&self, id: &Uuid) -> Result<Option<HistoricVariableInstance>, HistoryStoreError> {
        Ok(self.lock()?.get(id))
    }

    fn upsert(&self, record: HistoricVariableInstance) -> Result<(), HistoryStoreError> {
        let mut entries = self.lock()?;
        let mut updated = entries.clone();
        updated.upsert(record);
        self.save_locked(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn find(&self, query: &HistoricVariableQuery) -> Result<Vec<HistoricVariableInstance>, HistoryStoreError> {
        Ok(self.lock()?.find(query))
    }
}

/// In-memory history store, the default backend and the one used in tests.
#[derive(Default)]
pub struct InMemoryHistoricVariableStore {
    entries: Mutex<HistoryFile>,
}

impl InMemoryHistoricVariableStore {
    /// Create an empty in-memory history store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HistoryFile>, HistoryStoreError> {
        self.entries.lock().map_err(|_| HistoryStoreError::Poisoned)
    }
}

impl HistoricVariableStore for InMemoryHistoricVariableStore {
    fn get(&self, id: &Uuid) -> Result<Option<HistoricVariableInstance>, HistoryStoreError> {
        Ok(self.lock()?.get(id))
    }

    fn upsert(&self, record: HistoricVariableInstance) -> Result<(), HistoryStoreError> {
        self.lock()?.upsert(record);
        Ok(())
    }

    fn find(&self, query: &HistoricVariableQuery) -> Result<Vec<HistoricVariableInstance>, HistoryStoreError> {
        Ok(self.lock()?.find(query))
    }
}

fn default_history_path() -> PathBuf {
    if let Ok(path) = env::var(HISTORY_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    default_config_dir().join(HISTORY_FILE_NAME)
}

fn load_history_file(path: &Path) -> Result<HistoryFile, HistoryStoreError> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<HistoryFile>(&content) {
            Ok(file) => Ok(file),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Failed to parse history file; starting empty");
                Ok(HistoryFile::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(HistoryFile::default()),
        Err(error) => Err(HistoryStoreError::Io(error)),
    }
}
