//! Live and historic variable rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::{ValueFields, VariableValue};

/// A named, typed value owned by exactly one scope.
///
/// The `id` never changes once assigned, even when the value is later
/// rewritten with a different type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInstance {
    /// Stable identity shared with the historic record.
    pub id: Uuid,
    /// Owning scope.
    pub scope_id: String,
    /// Root scope of the owning tree.
    pub process_instance_id: String,
    /// Name, unique within the owning scope.
    pub name: String,
    /// Name of the variable type that produced `fields`.
    pub type_name: String,
    /// Persisted storage carriers.
    pub fields: ValueFields,
    /// Optimistic locking counter, bumped on every update.
    #[serde(default)]
    pub revision: u32,
    /// Deserialized value cache; never persisted.
    #[serde(skip)]
    pub cached_value: Option<VariableValue>,
}

impl VariableInstance {
    /// Returns the cached value when one is available.
    pub fn value(&self) -> Option<&VariableValue> {
        self.cached_value.as_ref()
    }
}

/// Audit snapshot of a variable's latest state.
///
/// One record exists per variable identity and is overwritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricVariableInstance {
    /// Same id as the originating [`VariableInstance`].
    pub id: Uuid,
    pub name: String,
    pub scope_id: String,
    pub process_instance_id: String,
    /// Type active at the last write.
    pub type_name: String,
    /// Value snapshot at the last write.
    pub value: VariableValue,
    /// Fixed at first creation.
    pub create_time: DateTime<Utc>,
    /// Advances on every recorded change, never backwards.
    pub last_updated_time: DateTime<Utc>,
    /// Set once the live variable has been removed.
    #[serde(default)]
    pub removed_time: Option<DateTime<Utc>>,
}

impl HistoricVariableInstance {
    /// Build a fresh snapshot for a newly created variable.
    pub fn from_instance(instance: &VariableInstance, value: VariableValue, at: DateTime<Utc>) -> Self {
        Self {
            id: instance.id,
            name: instance.name.clone(),
            scope_id: instance.scope_id.clone(),
            process_instance_id: instance.process_instance_id.clone(),
            type_name: instance.type_name.clone(),
            value,
            create_time: at,
            last_updated_time: at,
            removed_time: None,
        }
    }

    /// Overwrite the snapshot with the latest state of `instance`.
    ///
    /// `last_updated_time` is clamped so it never moves backwards.
    pub fn apply_update(&mut self, instance: &VariableInstance, value: VariableValue, at: DateTime<Utc>) {
        self.type_name = instance.type_name.clone();
        self.value = value;
        self.last_updated_time = at.max(self.last_updated_time);
        self.removed_time = None;
    }

    /// Mark the live variable as removed, keeping the last known value.
    pub fn mark_removed(&mut self, at: DateTime<Utc>) {
        let at = at.max(self.last_updated_time);
        self.last_updated_time = at;
        self.removed_time = Some(at);
    }

    pub fn is_removed(&self) -> bool {
        self.removed_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn instance() -> VariableInstance {
        VariableInstance {
            id: Uuid::new_v4(),
            scope_id: "pi-1".into(),
            process_instance_id: "pi-1".into(),
            name: "amount".into(),
            type_name: "integer".into(),
            fields: ValueFields {
                long: Some(10),
                ..ValueFields::default()
            },
            revision: 0,
            cached_value: Some(VariableValue::Integer(10)),
        }
    }

    #[test]
    fn update_never_moves_time_backwards() {
        let now = Utc::now();
        let mut instance = instance();
        let mut historic = HistoricVariableInstance::from_instance(&instance, VariableValue::Integer(10), now);

        instance.type_name = "string".into();
        historic.apply_update(&instance, VariableValue::from("ten"), now - Duration::seconds(30));

        assert_eq!(historic.create_time, now);
        assert_eq!(historic.last_updated_time, now);
        assert_eq!(historic.type_name, "string");
        assert_eq!(historic.value, VariableValue::from("ten"));
    }

    #[test]
    fn removal_keeps_last_value() {
        let now = Utc::now();
        let instance = instance();
        let mut historic = HistoricVariableInstance::from_instance(&instance, VariableValue::Integer(10), now);

        historic.mark_removed(now + Duration::seconds(1));

        assert!(historic.is_removed());
        assert_eq!(historic.value, VariableValue::Integer(10));
        assert_eq!(historic.id, instance.id);
    }
}
