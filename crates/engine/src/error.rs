//! Error type shared by the engine components.

use thiserror::Error;
use uuid::Uuid;
use varscope_types::VariableInstance;
use varscope_util::{HistoryStoreError, InfoStoreError, RowStoreError};

use crate::value_types::ValueTypeError;

/// Errors reported by scope, variable, history and data-object operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The operation referenced a scope id with no matching record.
    #[error("scope '{0}' not found")]
    ScopeNotFound(String),
    /// No registered variable type accepts the value.
    #[error("no registered variable type accepts a value of kind '{kind}'")]
    NoAcceptingType { kind: &'static str },
    /// The row store detected a concurrent update or create of the same
    /// variable; the caller may retry. `id` is unknown when the race was on creation.
    #[error("variable '{name}' in scope '{scope_id}' was modified concurrently")]
    OptimisticConflict { scope_id: String, name: String, id: Option<Uuid> },
    /// A stored row references a type that is no longer registered.
    #[error("variable type '{0}' is not registered")]
    UnknownVariableType(String),
    /// A variable type failed to write or read a value.
    #[error(transparent)]
    ValueType(#[from] ValueTypeError),
    /// A scope record was rejected by the hierarchy.
    #[error("invalid scope '{scope_id}': {reason}")]
    InvalidScope { scope_id: String, reason: String },
    #[error("process definition '{0}' not found")]
    DefinitionNotFound(String),
    #[error("invalid process definition '{key}': {reason}")]
    InvalidDefinition { key: String, reason: String },
    #[error("invalid locale tag '{0}'")]
    InvalidLocale(String),
    #[error(transparent)]
    RowStore(#[from] RowStoreError),
    #[error(transparent)]
    HistoryStore(#[from] HistoryStoreError),
    #[error(transparent)]
    InfoStore(#[from] InfoStoreError),
}

impl EngineError {
    /// Attribute a row store failure to the variable `instance` was written for.
    ///
    /// Revision mismatches and duplicate creates both become
    /// [`EngineError::OptimisticConflict`].
    pub(crate) fn from_row_write(error: RowStoreError, instance: &VariableInstance) -> Self {
        match error {
            RowStoreError::Conflict { id, .. } => EngineError::OptimisticConflict {
                scope_id: instance.scope_id.clone(),
                name: instance.name.clone(),
                id: Some(id),
            },
            RowStoreError::Duplicate { scope_id, name } => EngineError::OptimisticConflict { scope_id, name, id: None },
            other => EngineError::RowStore(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
