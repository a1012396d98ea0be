//! Typed variable values and the fixed storage carrier set they decompose onto.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A value held by a process variable.
///
/// `Null` is a real, storable state: a variable declared with a null value
/// exists, whereas a missing variable has no row at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VariableValue {
    Null,
    Boolean(bool),
    Short(i16),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    /// Arbitrary structured payload.
    Json(JsonValue),
    /// Value of a user-defined kind, handled by an externally registered type.
    Custom(CustomValue),
}

/// Opaque value of a user-defined kind.
///
/// Equality compares the payload contents, never identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomValue {
    /// Caller-chosen discriminator used by custom types to claim the value.
    pub kind: String,
    /// Raw payload.
    pub payload: Vec<u8>,
}

impl CustomValue {
    pub fn new(kind: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

impl VariableValue {
    /// Returns `true` for the logical null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short label describing the variant, used in diagnostics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Short(_) => "short",
            Self::Integer(_) => "integer",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Uuid(_) => "uuid",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::Custom(_) => "custom",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Renders the value as JSON for display surfaces.
    ///
    /// Binary payloads are rendered as byte arrays; dates use RFC 3339.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(flag) => JsonValue::Bool(*flag),
            Self::Short(number) => JsonValue::from(*number),
            Self::Integer(number) => JsonValue::from(*number),
            Self::Long(number) => JsonValue::from(*number),
            Self::Double(number) => JsonValue::from(*number),
            Self::String(text) => JsonValue::String(text.clone()),
            Self::Date(date) => JsonValue::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Uuid(uuid) => JsonValue::String(uuid.to_string()),
            Self::Bytes(bytes) => JsonValue::from(bytes.clone()),
            Self::Json(value) => value.clone(),
            Self::Custom(custom) => serde_json::json!({ "kind": custom.kind, "payload": custom.payload }),
        }
    }

    /// Best-effort conversion from plain JSON, as supplied by files and forms.
    ///
    /// Integers become `Integer` when they fit in 32 bits and `Long` otherwise;
    /// arrays and objects become `Json`.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(flag) => Self::Boolean(flag),
            JsonValue::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    i32::try_from(integer).map(Self::Integer).unwrap_or(Self::Long(integer))
                } else {
                    number.as_f64().map(Self::Double).unwrap_or(Self::Json(JsonValue::Number(number)))
                }
            }
            JsonValue::String(text) => Self::String(text),
            other => Self::Json(other),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i16> for VariableValue {
    fn from(value: i16) -> Self {
        Self::Short(value)
    }
}

impl From<i32> for VariableValue {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<Vec<u8>> for VariableValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<DateTime<Utc>> for VariableValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Uuid> for VariableValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<CustomValue> for VariableValue {
    fn from(value: CustomValue) -> Self {
        Self::Custom(value)
    }
}

impl<T: Into<VariableValue>> From<Option<T>> for VariableValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Fixed set of storage carriers a variable row persists.
///
/// A variable type populates exactly one value carrier. `text2` holds
/// type-specific auxiliary metadata and is never a value carrier on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueFields {
    /// Short text, bounded by the inline threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Auxiliary text metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text2: Option<String>,
    /// Integer carrier (booleans, shorts, integers, longs, timestamps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<i64>,
    /// Floating point carrier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double: Option<f64>,
    /// Blob carrier (binary payloads, long text, serialized objects).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
}

impl ValueFields {
    /// Returns `true` when no carrier is populated.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.text2.is_none() && self.long.is_none() && self.double.is_none() && self.bytes.is_none()
    }

    /// Resets every carrier.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
