//! Level-aware audit log of variable snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;
use varscope_types::{HistoricVariableInstance, HistoryLevel, VariableInstance, VariableValue};
use varscope_util::{HistoricVariableQuery, HistoricVariableStore, InMemoryHistoricVariableStore};

use crate::error::EngineResult;

/// Keeps one snapshot per variable identity, overwritten on every change.
///
/// When the configured level does not capture variables every write is a
/// no-op and every query comes back empty.
pub struct HistoricVariableLog {
    store: Arc<dyn HistoricVariableStore>,
    level: HistoryLevel,
}

impl HistoricVariableLog {
    pub fn new(store: Arc<dyn HistoricVariableStore>, level: HistoryLevel) -> Self {
        Self { store, level }
    }

    /// In-memory log at the given level.
    pub fn in_memory(level: HistoryLevel) -> Self {
        Self::new(Arc::new(InMemoryHistoricVariableStore::new()), level)
    }

    pub fn level(&self) -> HistoryLevel {
        self.level
    }

    pub fn is_capturing(&self) -> bool {
        self.level.captures_variables()
    }

    pub fn record_created(&self, instance: &VariableInstance, value: &VariableValue, at: DateTime<Utc>) -> EngineResult<()> {
        if !self.is_capturing() {
            return Ok(());
        }
        debug!(variable_id = %instance.id, name = %instance.name, "historic variable created");
        self.store
            .upsert(HistoricVariableInstance::from_instance(instance, value.clone(), at))?;
        Ok(())
    }

    pub fn record_updated(&self, instance: &VariableInstance, value: &VariableValue, at: DateTime<Utc>) -> EngineResult<()> {
        if !self.is_capturing() {
            return Ok(());
        }
        let record = match self.store.get(&instance.id)? {
            Some(mut existing) => {
                existing.apply_update(instance, value.clone(), at);
                existing
            }
            None => HistoricVariableInstance::from_instance(instance, value.clone(), at),
        };
        self.store.upsert(record)?;
        Ok(())
    }

    /// Stamp the snapshot as removed, keeping its last known value.
    pub fn record_removed(&self, instance: &VariableInstance, last_value: &VariableValue, at: DateTime<Utc>) -> EngineResult<()> {
        if !self.is_capturing() {
            return Ok(());
        }
        let mut record = match self.store.get(&instance.id)? {
            Some(existing) => existing,
            None => HistoricVariableInstance::from_instance(instance, last_value.clone(), at),
        };
        record.mark_removed(at);
        debug!(variable_id = %instance.id, name = %instance.name, "historic variable marked removed");
        self.store.upsert(record)?;
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> EngineResult<Option<HistoricVariableInstance>> {
        if !self.is_capturing() {
            return Ok(None);
        }
        Ok(self.store.get(id)?)
    }

    pub fn find(&self, query: &HistoricVariableQuery) -> EngineResult<Vec<HistoricVariableInstance>> {
        if !self.is_capturing() {
            return Ok(Vec::new());
        }
        Ok(self.store.find(query)?)
    }

    pub fn count(&self, query: &HistoricVariableQuery) -> EngineResult<usize> {
        if !self.is_capturing() {
            return Ok(0);
        }
        Ok(self.store.count(query)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use varscope_types::ValueFields;

    fn instance(name: &str) -> VariableInstance {
        VariableInstance {
            id: Uuid::new_v4(),
            scope_id: "pi-1".into(),
            process_instance_id: "pi-1".into(),
            name: name.into(),
            type_name: "null".into(),
            fields: ValueFields::default(),
            revision: 0,
            cached_value: None,
        }
    }

    #[test]
    fn none_level_records_nothing() {
        let log = HistoricVariableLog::in_memory(HistoryLevel::None);
        let instance = instance("a");
        log.record_created(&instance, &VariableValue::Null, Utc::now()).unwrap();

        assert!(log.get(&instance.id).unwrap().is_none());
        assert!(log.find(&HistoricVariableQuery::new()).unwrap().is_empty());
        assert_eq!(log.count(&HistoricVariableQuery::new()).unwrap(), 0);
    }

    #[test]
    fn updates_overwrite_the_same_snapshot() {
        let log = HistoricVariableLog::in_memory(HistoryLevel::Activity);
        let mut instance = instance("a");
        let created = Utc::now();
        log.record_created(&instance, &VariableValue::Null, created).unwrap();

        instance.type_name = "integer".into();
        log.record_updated(&instance, &VariableValue::Integer(4), created + Duration::seconds(5))
            .unwrap();

        let records = log.find(&HistoricVariableQuery::new().variable_name("a")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, instance.id);
        assert_eq!(records[0].create_time, created);
        assert_eq!(records[0].last_updated_time, created + Duration::seconds(5));
        assert_eq!(records[0].value, VariableValue::Integer(4));
    }

    #[test]
    fn removal_keeps_last_value() {
        let log = HistoricVariableLog::in_memory(HistoryLevel::Full);
        let instance = instance("a");
        let at = Utc::now();
        log.record_created(&instance, &VariableValue::from("last"), at).unwrap();
        log.record_removed(&instance, &VariableValue::from("last"), at).unwrap();

        let record = log.get(&instance.id).unwrap().unwrap();
        assert!(record.is_removed());
        assert_eq!(record.value, VariableValue::from("last"));
    }
}
