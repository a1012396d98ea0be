//! Pluggable variable type dispatch.
//!
//! A [`VariableTypeRegistry`] holds an ordered list of [`VariableType`]
//! implementations. Storing a value walks the list and hands the value to the
//! first type whose `can_store` predicate accepts it; the `serializable`
//! fallback sits at the end and accepts every non-null value. Custom types are
//! inserted ahead of the fallback unless an explicit position is given.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::debug;
use varscope_types::{ValueFields, VariableValue};

use crate::error::{EngineError, EngineResult};

pub mod builtin;

pub use builtin::{
    BooleanType, BytesType, DEFAULT_MAX_INLINE_TEXT_BYTES, DateType, DoubleType, IntegerType, JsonType, LongStringType, LongType, NullType,
    SERIALIZABLE_TYPE_NAME, SerializableType, ShortType, StringType, UuidType, utf16_byte_len,
};

/// Failure raised by a variable type while writing or reading its carriers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueTypeError {
    #[error("variable type '{type_name}' cannot store a value of kind '{kind}'")]
    Unsupported { type_name: String, kind: &'static str },
    #[error("variable type '{type_name}' found nothing in its '{carrier}' carrier")]
    MissingCarrier { type_name: String, carrier: &'static str },
    #[error("variable type '{type_name}' could not decode its payload: {reason}")]
    Corrupt { type_name: String, reason: String },
}

impl ValueTypeError {
    pub fn unsupported(type_name: &str, value: &VariableValue) -> Self {
        Self::Unsupported {
            type_name: type_name.to_string(),
            kind: value.kind_label(),
        }
    }

    pub fn missing(type_name: &str, carrier: &'static str) -> Self {
        Self::MissingCarrier {
            type_name: type_name.to_string(),
            carrier,
        }
    }

    pub fn corrupt(type_name: &str, reason: impl ToString) -> Self {
        Self::Corrupt {
            type_name: type_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Capability set of one value kind.
///
/// `write_value` and `read_value` must round-trip every value `can_store`
/// accepts. Writers only ever see a scratch [`ValueFields`]; the caller adopts
/// it once the write has completed.
pub trait VariableType: Send + Sync {
    /// Unique name persisted alongside the carriers.
    fn type_name(&self) -> &str;

    /// Whether the deserialized value may be cached on the instance.
    fn is_cachable(&self) -> bool {
        true
    }

    fn can_store(&self, value: &VariableValue) -> bool;

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError>;

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError>;
}

/// Ordered, first-match-wins collection of variable types.
pub struct VariableTypeRegistry {
    types: RwLock<Vec<Arc<dyn VariableType>>>,
}

impl Default for VariableTypeRegistry {
    fn default() -> Self {
        Self::with_builtin_types(DEFAULT_MAX_INLINE_TEXT_BYTES)
    }
}

impl VariableTypeRegistry {
    /// An empty registry; most callers want [`VariableTypeRegistry::with_builtin_types`].
    pub fn empty() -> Self {
        Self {
            types: RwLock::new(Vec::new()),
        }
    }

    /// The built-in types in priority order, with the given inline text threshold.
    pub fn with_builtin_types(max_inline_text_bytes: usize) -> Self {
        let types: Vec<Arc<dyn VariableType>> = vec![
            Arc::new(NullType),
            Arc::new(BooleanType),
            Arc::new(ShortType),
            Arc::new(IntegerType),
            Arc::new(LongType),
            Arc::new(DoubleType),
            Arc::new(StringType::new(max_inline_text_bytes)),
            Arc::new(LongStringType::new(max_inline_text_bytes)),
            Arc::new(DateType),
            Arc::new(UuidType),
            Arc::new(BytesType),
            Arc::new(JsonType),
            Arc::new(SerializableType),
        ];
        Self {
            types: RwLock::new(types),
        }
    }

    /// Register a type ahead of the `serializable` fallback.
    ///
    /// A type already registered under the same name is replaced.
    pub fn add_type(&self, variable_type: Arc<dyn VariableType>) {
        let mut types = self.write();
        types.retain(|existing| existing.type_name() != variable_type.type_name());
        let index = match types.last() {
            Some(last) if last.type_name() == SERIALIZABLE_TYPE_NAME => types.len() - 1,
            _ => types.len(),
        };
        debug!(type_name = %variable_type.type_name(), index, "variable type registered");
        types.insert(index, variable_type);
    }

    /// Register a type at an explicit position (clamped to the list length).
    pub fn add_type_at(&self, index: usize, variable_type: Arc<dyn VariableType>) {
        let mut types = self.write();
        types.retain(|existing| existing.type_name() != variable_type.type_name());
        let index = index.min(types.len());
        debug!(type_name = %variable_type.type_name(), index, "variable type registered");
        types.insert(index, variable_type);
    }

    pub fn remove_type(&self, type_name: &str) -> Option<Arc<dyn VariableType>> {
        let mut types = self.write();
        let position = types.iter().position(|existing| existing.type_name() == type_name)?;
        Some(types.remove(position))
    }

    pub fn get_type(&self, type_name: &str) -> Option<Arc<dyn VariableType>> {
        self.read().iter().find(|existing| existing.type_name() == type_name).cloned()
    }

    /// Registered type names in priority order.
    pub fn type_names(&self) -> Vec<String> {
        self.read().iter().map(|existing| existing.type_name().to_string()).collect()
    }

    /// First registered type accepting `value`.
    pub fn find_type_for_value(&self, value: &VariableValue) -> EngineResult<Arc<dyn VariableType>> {
        self.read()
            .iter()
            .find(|candidate| candidate.can_store(value))
            .cloned()
            .ok_or(EngineError::NoAcceptingType { kind: value.kind_label() })
    }

    /// Select a type for `value` and write it into fresh carriers.
    pub fn serialize(&self, value: &VariableValue) -> EngineResult<(Arc<dyn VariableType>, ValueFields)> {
        let variable_type = self.find_type_for_value(value)?;
        let mut scratch = ValueFields::default();
        variable_type.write_value(value, &mut scratch)?;
        Ok((variable_type, scratch))
    }

    /// Read a value back using the type recorded on the row.
    pub fn deserialize(&self, type_name: &str, fields: &ValueFields) -> EngineResult<VariableValue> {
        let variable_type = self
            .get_type(type_name)
            .ok_or_else(|| EngineError::UnknownVariableType(type_name.to_string()))?;
        Ok(variable_type.read_value(fields)?)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn VariableType>>> {
        self.types.read().expect("variable type registry lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn VariableType>>> {
        self.types.write().expect("variable type registry lock poisoned")
    }
}
