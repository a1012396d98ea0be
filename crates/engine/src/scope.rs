//! Flat scope table with parent back-references.
//!
//! Scopes are stored by id; visibility is resolved by walking `parent_id`
//! upward in a loop bounded by the table size, so a corrupted chain can never
//! spin forever.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use varscope_types::Scope;

use crate::error::{EngineError, EngineResult};

#[derive(Default)]
struct ScopeTable {
    scopes: HashMap<String, Scope>,
    children: HashMap<String, BTreeSet<String>>,
}

/// Registry of live execution scopes.
#[derive(Default)]
pub struct ScopeTree {
    table: RwLock<ScopeTable>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope created by the execution engine.
    pub fn insert(&self, scope: Scope) -> EngineResult<()> {
        let mut table = self.write();
        if table.scopes.contains_key(&scope.id) {
            return Err(invalid(&scope.id, "a scope with this id already exists"));
        }
        match scope.parent_id.as_deref() {
            None if scope.process_instance_id != scope.id => {
                return Err(invalid(&scope.id, "a root scope must be its own process instance"));
            }
            None => {}
            Some(parent_id) => {
                let Some(parent) = table.scopes.get(parent_id) else {
                    return Err(invalid(&scope.id, &format!("parent scope '{parent_id}' does not exist")));
                };
                if parent.process_instance_id != scope.process_instance_id {
                    return Err(invalid(&scope.id, "process instance differs from the parent's"));
                }
            }
        }

        debug!(
            scope_id = %scope.id,
            parent_id = ?scope.parent_id,
            process_instance_id = %scope.process_instance_id,
            activity_id = ?scope.activity_id,
            "scope registered"
        );
        if let Some(parent_id) = scope.parent_id.clone() {
            table.children.entry(parent_id).or_default().insert(scope.id.clone());
        }
        table.scopes.insert(scope.id.clone(), scope);
        Ok(())
    }

    /// Remove a scope and every descendant, returning the removed ids (outermost first).
    pub fn remove(&self, scope_id: &str) -> EngineResult<Vec<String>> {
        let mut table = self.write();
        let Some(scope) = table.scopes.get(scope_id) else {
            return Err(EngineError::ScopeNotFound(scope_id.to_string()));
        };
        if let Some(parent_id) = scope.parent_id.clone()
            && let Some(siblings) = table.children.get_mut(&parent_id)
        {
            siblings.remove(scope_id);
            if siblings.is_empty() {
                table.children.remove(&parent_id);
            }
        }

        let mut removed = Vec::new();
        let mut pending = vec![scope_id.to_string()];
        while let Some(current) = pending.pop() {
            if let Some(children) = table.children.remove(&current) {
                pending.extend(children);
            }
            if table.scopes.remove(&current).is_some() {
                removed.push(current);
            }
        }
        debug!(scope_id = %scope_id, removed = removed.len(), "scope subtree removed");
        Ok(removed)
    }

    pub fn get(&self, scope_id: &str) -> EngineResult<Scope> {
        self.read()
            .scopes
            .get(scope_id)
            .cloned()
            .ok_or_else(|| EngineError::ScopeNotFound(scope_id.to_string()))
    }

    pub fn contains(&self, scope_id: &str) -> bool {
        self.read().scopes.contains_key(scope_id)
    }

    /// Direct children of a scope, sorted by id.
    pub fn children(&self, scope_id: &str) -> EngineResult<Vec<String>> {
        let table = self.read();
        if !table.scopes.contains_key(scope_id) {
            return Err(EngineError::ScopeNotFound(scope_id.to_string()));
        }
        Ok(table
            .children
            .get(scope_id)
            .map(|children| children.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// The scope chain visible from `scope_id`, innermost first and ending at the root.
    pub fn resolve_visible(&self, scope_id: &str) -> EngineResult<Vec<String>> {
        Ok(self.resolve_chain(scope_id)?.into_iter().map(|scope| scope.id).collect())
    }

    /// Like [`ScopeTree::resolve_visible`] but returns the full records.
    pub fn resolve_chain(&self, scope_id: &str) -> EngineResult<Vec<Scope>> {
        let table = self.read();
        let mut current = table
            .scopes
            .get(scope_id)
            .ok_or_else(|| EngineError::ScopeNotFound(scope_id.to_string()))?;
        let mut chain = vec![current.clone()];
        for _ in 0..table.scopes.len() {
            let Some(parent_id) = current.parent_id.as_deref() else {
                return Ok(chain);
            };
            current = table
                .scopes
                .get(parent_id)
                .ok_or_else(|| EngineError::ScopeNotFound(parent_id.to_string()))?;
            chain.push(current.clone());
        }
        Err(invalid(scope_id, "parent chain does not terminate"))
    }

    pub fn len(&self) -> usize {
        self.read().scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, ScopeTable> {
        self.table.read().expect("scope table lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScopeTable> {
        self.table.write().expect("scope table lock poisoned")
    }
}

fn invalid(scope_id: &str, reason: &str) -> EngineError {
    EngineError::InvalidScope {
        scope_id: scope_id.to_string(),
        reason: reason.to_string(),
    }
}
