//! Built-in variable types.

use chrono::DateTime;
use uuid::Uuid;
use varscope_types::{ValueFields, VariableValue};

use super::{ValueTypeError, VariableType};

/// Inline text limit in UTF-16 bytes (2000 characters of the basic plane).
pub const DEFAULT_MAX_INLINE_TEXT_BYTES: usize = 4000;

/// Name of the catch-all type that must stay last in the registry.
pub const SERIALIZABLE_TYPE_NAME: &str = "serializable";

/// Encoded size of `text` as UTF-16, the unit the inline limit is measured in.
pub fn utf16_byte_len(text: &str) -> usize {
    text.encode_utf16().count() * 2
}

fn long_carrier(type_name: &str, fields: &ValueFields) -> Result<i64, ValueTypeError> {
    fields.long.ok_or_else(|| ValueTypeError::missing(type_name, "long"))
}

fn bytes_carrier<'a>(type_name: &str, fields: &'a ValueFields) -> Result<&'a [u8], ValueTypeError> {
    fields.bytes.as_deref().ok_or_else(|| ValueTypeError::missing(type_name, "bytes"))
}

pub struct NullType;

impl VariableType for NullType {
    fn type_name(&self) -> &str {
        "null"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        value.is_null()
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        if !value.is_null() {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        }
        fields.clear();
        Ok(())
    }

    fn read_value(&self, _fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        Ok(VariableValue::Null)
    }
}

/// Stored in the long carrier as 1 or 0.
pub struct BooleanType;

impl VariableType for BooleanType {
    fn type_name(&self) -> &str {
        "boolean"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Boolean(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Boolean(flag) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.long = Some(i64::from(*flag));
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        Ok(VariableValue::Boolean(long_carrier(self.type_name(), fields)? == 1))
    }
}

pub struct ShortType;

impl VariableType for ShortType {
    fn type_name(&self) -> &str {
        "short"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Short(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Short(number) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.long = Some(i64::from(*number));
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        let stored = long_carrier(self.type_name(), fields)?;
        i16::try_from(stored)
            .map(VariableValue::Short)
            .map_err(|error| ValueTypeError::corrupt(self.type_name(), error))
    }
}

pub struct IntegerType;

impl VariableType for IntegerType {
    fn type_name(&self) -> &str {
        "integer"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Integer(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Integer(number) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.long = Some(i64::from(*number));
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        let stored = long_carrier(self.type_name(), fields)?;
        i32::try_from(stored)
            .map(VariableValue::Integer)
            .map_err(|error| ValueTypeError::corrupt(self.type_name(), error))
    }
}

pub struct LongType;

impl VariableType for LongType {
    fn type_name(&self) -> &str {
        "long"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Long(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Long(number) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.long = Some(*number);
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        Ok(VariableValue::Long(long_carrier(self.type_name(), fields)?))
    }
}

pub struct DoubleType;

impl VariableType for DoubleType {
    fn type_name(&self) -> &str {
        "double"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Double(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Double(number) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.double = Some(*number);
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        fields
            .double
            .map(VariableValue::Double)
            .ok_or_else(|| ValueTypeError::missing(self.type_name(), "double"))
    }
}

/// Inline text, up to the configured UTF-16 byte limit.
pub struct StringType {
    max_inline_bytes: usize,
}

impl StringType {
    pub fn new(max_inline_bytes: usize) -> Self {
        Self { max_inline_bytes }
    }
}

impl VariableType for StringType {
    fn type_name(&self) -> &str {
        "string"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        value.as_str().is_some_and(|text| utf16_byte_len(text) <= self.max_inline_bytes)
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let Some(text) = value.as_str() else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.text = Some(text.to_string());
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        fields
            .text
            .clone()
            .map(VariableValue::String)
            .ok_or_else(|| ValueTypeError::missing(self.type_name(), "text"))
    }
}

/// Text beyond the inline limit, kept as UTF-8 in the bytes carrier.
pub struct LongStringType {
    max_inline_bytes: usize,
}

impl LongStringType {
    pub fn new(max_inline_bytes: usize) -> Self {
        Self { max_inline_bytes }
    }
}

impl VariableType for LongStringType {
    fn type_name(&self) -> &str {
        "longString"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        value.as_str().is_some_and(|text| utf16_byte_len(text) > self.max_inline_bytes)
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let Some(text) = value.as_str() else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.bytes = Some(text.as_bytes().to_vec());
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        let bytes = bytes_carrier(self.type_name(), fields)?;
        String::from_utf8(bytes.to_vec())
            .map(VariableValue::String)
            .map_err(|error| ValueTypeError::corrupt(self.type_name(), error))
    }
}

/// Nanoseconds since the epoch in the long carrier.
pub struct DateType;

impl VariableType for DateType {
    fn type_name(&self) -> &str {
        "date"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Date(date) if date.timestamp_nanos_opt().is_some())
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Date(date) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        let nanos = date
            .timestamp_nanos_opt()
            .ok_or_else(|| ValueTypeError::unsupported(self.type_name(), value))?;
        fields.long = Some(nanos);
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        Ok(VariableValue::Date(DateTime::from_timestamp_nanos(long_carrier(self.type_name(), fields)?)))
    }
}

pub struct UuidType;

impl VariableType for UuidType {
    fn type_name(&self) -> &str {
        "uuid"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Uuid(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Uuid(uuid) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.text = Some(uuid.hyphenated().to_string());
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        let text = fields.text.as_deref().ok_or_else(|| ValueTypeError::missing(self.type_name(), "text"))?;
        Uuid::parse_str(text)
            .map(VariableValue::Uuid)
            .map_err(|error| ValueTypeError::corrupt(self.type_name(), error))
    }
}

pub struct BytesType;

impl VariableType for BytesType {
    fn type_name(&self) -> &str {
        "bytes"
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Bytes(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Bytes(bytes) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.bytes = Some(bytes.clone());
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        Ok(VariableValue::Bytes(bytes_carrier(self.type_name(), fields)?.to_vec()))
    }
}

/// Structured JSON documents, encoded into the bytes carrier.
pub struct JsonType;

impl VariableType for JsonType {
    fn type_name(&self) -> &str {
        "json"
    }

    fn is_cachable(&self) -> bool {
        false
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        matches!(value, VariableValue::Json(_))
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        let VariableValue::Json(document) = value else {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        };
        fields.bytes = Some(serde_json::to_vec(document).map_err(|error| ValueTypeError::corrupt(self.type_name(), error))?);
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        let bytes = bytes_carrier(self.type_name(), fields)?;
        serde_json::from_slice(bytes)
            .map(VariableValue::Json)
            .map_err(|error| ValueTypeError::corrupt(self.type_name(), error))
    }
}

/// Fallback that encodes the whole tagged value; accepts anything but null.
pub struct SerializableType;

impl VariableType for SerializableType {
    fn type_name(&self) -> &str {
        SERIALIZABLE_TYPE_NAME
    }

    fn is_cachable(&self) -> bool {
        false
    }

    fn can_store(&self, value: &VariableValue) -> bool {
        !value.is_null()
    }

    fn write_value(&self, value: &VariableValue, fields: &mut ValueFields) -> Result<(), ValueTypeError> {
        if value.is_null() {
            return Err(ValueTypeError::unsupported(self.type_name(), value));
        }
        fields.bytes = Some(serde_json::to_vec(value).map_err(|error| ValueTypeError::corrupt(self.type_name(), error))?);
        Ok(())
    }

    fn read_value(&self, fields: &ValueFields) -> Result<VariableValue, ValueTypeError> {
        let bytes = bytes_carrier(self.type_name(), fields)?;
        serde_json::from_slice(bytes).map_err(|error| ValueTypeError::corrupt(self.type_name(), error))
    }
}
