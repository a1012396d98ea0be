//! Row storage for live variable instances.
//!
//! Rows are keyed by their stable id and indexed by `(scope id, name)`, which is
//! unique per row. Updates carry the revision the writer last observed so a
//! concurrent writer that got there first is detected instead of overwritten.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use uuid::Uuid;
use varscope_types::VariableInstance;

/// Errors surfaced by variable row stores.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowStoreError {
    /// The row was modified since the writer last read it.
    #[error("variable {id} was modified concurrently (expected revision {expected}, found {actual})")]
    Conflict { id: Uuid, expected: u32, actual: u32 },
    /// A row with the same name already exists in the scope.
    #[error("variable '{name}' already exists in scope '{scope_id}'")]
    Duplicate { scope_id: String, name: String },
    /// No row with the given id exists.
    #[error("variable {0} not found")]
    NotFound(Uuid),
    #[error("row store backend error: {0}")]
    Backend(String),
}

/// Storage contract for live variable rows.
pub trait VariableRowStore: Send + Sync {
    /// Insert a new row. Fails when `(scope id, name)` is already taken.
    fn insert(&self, instance: VariableInstance) -> Result<(), RowStoreError>;

    /// Replace an existing row if its stored revision still equals `expected_revision`.
    ///
    /// Returns the new revision on success.
    fn update(&self, instance: VariableInstance, expected_revision: u32) -> Result<u32, RowStoreError>;

    /// Delete a row by id, returning it.
    fn delete(&self, id: &Uuid) -> Result<VariableInstance, RowStoreError>;

    fn get(&self, id: &Uuid) -> Result<Option<VariableInstance>, RowStoreError>;

    /// Find the row named `name` owned by `scope_id`.
    fn find(&self, scope_id: &str, name: &str) -> Result<Option<VariableInstance>, RowStoreError>;

    /// All rows owned by `scope_id`, ordered by name.
    fn list_by_scope(&self, scope_id: &str) -> Result<Vec<VariableInstance>, RowStoreError>;
}

#[derive(Default)]
struct RowTables {
    rows: HashMap<Uuid, VariableInstance>,
    by_scope: HashMap<String, BTreeMap<String, Uuid>>,
}

/// In-memory row store backed by a read/write lock.
#[derive(Default)]
pub struct InMemoryVariableRowStore {
    tables: RwLock<RowTables>,
}

impl InMemoryVariableRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RowTables>, RowStoreError> {
        self.tables.read().map_err(|_| RowStoreError::Backend("row store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RowTables>, RowStoreError> {
        self.tables.write().map_err(|_| RowStoreError::Backend("row store lock poisoned".into()))
    }
}

impl VariableRowStore for InMemoryVariableRowStore {
    fn insert(&self, mut instance: VariableInstance) -> Result<(), RowStoreError> {
        let mut tables = self.write()?;
        let names = tables.by_scope.entry(instance.scope_id.clone()).or_default();
        if names.contains_key(&instance.name) {
            return Err(RowStoreError::Duplicate {
                scope_id: instance.scope_id,
                name: instance.name,
            });
        }
        names.insert(instance.name.clone(), instance.id);
        instance.cached_value = None;
        tables.rows.insert(instance.id, instance);
        Ok(())
    }

    fn update(&self, mut instance: VariableInstance, expected_revision: u32) -> Result<u32, RowStoreError> {
        let mut tables = self.write()?;
        let Some(stored) = tables.rows.get_mut(&instance.id) else {
            return Err(RowStoreError::NotFound(instance.id));
        };
        if stored.revision != expected_revision {
            return Err(RowStoreError::Conflict {
                id: instance.id,
                expected: expected_revision,
                actual: stored.revision,
            });
        }
        // Identity columns are immutable; only type, carriers and revision move.
        instance.scope_id = stored.scope_id.clone();
        instance.name = stored.name.clone();
        instance.revision = expected_revision.wrapping_add(1);
        instance.cached_value = None;
        let revision = instance.revision;
        *stored = instance;
        Ok(revision)
    }

    fn delete(&self, id: &Uuid) -> Result<VariableInstance, RowStoreError> {
        let mut tables = self.write()?;
        let removed = tables.rows.remove(id).ok_or(RowStoreError::NotFound(*id))?;
        if let Some(names) = tables.by_scope.get_mut(&removed.scope_id) {
            names.remove(&removed.name);
            if names.is_empty() {
                tables.by_scope.remove(&removed.scope_id);
            }
        }
        Ok(removed)
    }

    fn get(&self, id: &Uuid) -> Result<Option<VariableInstance>, RowStoreError> {
        Ok(self.read()?.rows.get(id).cloned())
    }

    fn find(&self, scope_id: &str, name: &str) -> Result<Option<VariableInstance>, RowStoreError> {
        let tables = self.read()?;
        Ok(tables
            .by_scope
            .get(scope_id)
            .and_then(|names| names.get(name))
            .and_then(|id| tables.rows.get(id))
            .cloned())
    }

    fn list_by_scope(&self, scope_id: &str) -> Result<Vec<VariableInstance>, RowStoreError> {
        let tables = self.read()?;
        let Some(names) = tables.by_scope.get(scope_id) else {
            return Ok(Vec::new());
        };
        Ok(names.values().filter_map(|id| tables.rows.get(id)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varscope_types::ValueFields;

    fn row(scope_id: &str, name: &str, text: &str) -> VariableInstance {
        VariableInstance {
            id: Uuid::new_v4(),
            scope_id: scope_id.into(),
            process_instance_id: "pi-1".into(),
            name: name.into(),
            type_name: "string".into(),
            fields: ValueFields {
                text: Some(text.into()),
                ..ValueFields::default()
            },
            revision: 0,
            cached_value: None,
        }
    }

    #[test]
    fn insert_then_find_by_scope_and_name() {
        let store = InMemoryVariableRowStore::new();
        let instance = row("pi-1", "a", "x");
        let id = instance.id;
        store.insert(instance).unwrap();

        let found = store.find("pi-1", "a").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.find("pi-1", "b").unwrap().is_none());
        assert!(store.find("other", "a").unwrap().is_none());
    }

    #[test]
    fn duplicate_names_are_rejected_per_scope() {
        let store = InMemoryVariableRowStore::new();
        store.insert(row("pi-1", "a", "x")).unwrap();
        store.insert(row("exec-2", "a", "y")).unwrap();

        let error = store.insert(row("pi-1", "a", "z")).unwrap_err();
        assert_eq!(
            error,
            RowStoreError::Duplicate {
                scope_id: "pi-1".into(),
                name: "a".into()
            }
        );
        assert_eq!(store.list_by_scope("pi-1").unwrap().len(), 1);
        assert_eq!(store.list_by_scope("exec-2").unwrap().len(), 1);
    }

    #[test]
    fn stale_revision_is_a_conflict() {
        let store = InMemoryVariableRowStore::new();
        let instance = row("pi-1", "a", "x");
        store.insert(instance.clone()).unwrap();

        let mut first = instance.clone();
        first.fields.text = Some("first".into());
        assert_eq!(store.update(first, 0).unwrap(), 1);

        let mut second = instance.clone();
        second.fields.text = Some("second".into());
        let error = store.update(second, 0).unwrap_err();
        assert!(matches!(error, RowStoreError::Conflict { expected: 0, actual: 1, .. }));

        let stored = store.get(&instance.id).unwrap().unwrap();
        assert_eq!(stored.fields.text.as_deref(), Some("first"));
    }

    #[test]
    fn delete_frees_the_name() {
        let store = InMemoryVariableRowStore::new();
        let instance = row("pi-1", "a", "x");
        let id = instance.id;
        store.insert(instance).unwrap();

        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.name, "a");
        assert!(store.list_by_scope("pi-1").unwrap().is_empty());
        assert_eq!(store.delete(&id).unwrap_err(), RowStoreError::NotFound(id));
        store.insert(row("pi-1", "a", "again")).unwrap();
    }

    #[test]
    fn list_by_scope_is_sorted_by_name() {
        let store = InMemoryVariableRowStore::new();
        store.insert(row("pi-1", "b", "2")).unwrap();
        store.insert(row("pi-1", "a", "1")).unwrap();
        store.insert(row("exec-2", "c", "3")).unwrap();

        let names: Vec<_> = store.list_by_scope("pi-1").unwrap().into_iter().map(|row| row.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store.list_by_scope("missing").unwrap().is_empty());
    }
}
