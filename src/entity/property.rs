//! Property value types for nodes and relationships
//!
//! The server stores primitives and homogeneous arrays of primitives.
//! Values travel as plain JSON, so the enum serializes untagged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{RestError, RestResult};
use crate::outcome::json_kind;

/// Property value type
///
/// Supports:
/// - String
/// - Integer (i64)
/// - Float (f64)
/// - Boolean
/// - Array (homogeneous, of the scalar variants)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Get string value if this is a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get integer value if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get float value; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get boolean value if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get array value if this is an array
    pub fn as_array(&self) -> Option<&Vec<PropertyValue>> {
        match self {
            PropertyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "String",
            PropertyValue::Integer(_) => "Integer",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Boolean(_) => "Boolean",
            PropertyValue::Array(_) => "Array",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::Integer(i) => Value::from(*i),
            PropertyValue::Float(f) => Value::from(*f),
            PropertyValue::Boolean(b) => Value::Bool(*b),
            PropertyValue::Array(arr) => Value::Array(arr.iter().map(PropertyValue::to_json).collect()),
        }
    }

    /// Convert a JSON property value as stored on the server.
    ///
    /// `null` means the property is absent. An empty array short-circuits
    /// to an empty `Array`: there is no element to infer a type from, and
    /// the general path would reject it.
    pub fn from_json(key: &str, value: &Value) -> RestResult<Option<PropertyValue>> {
        match value {
            Value::Null => Ok(None),
            Value::Array(items) if items.is_empty() => Ok(Some(PropertyValue::Array(Vec::new()))),
            Value::Array(items) => array_from_json(key, items).map(Some),
            other => scalar_from_json(key, other).map(Some),
        }
    }
}

fn scalar_from_json(key: &str, value: &Value) -> RestResult<PropertyValue> {
    match value {
        Value::Bool(b) => Ok(PropertyValue::Boolean(*b)),
        Value::String(s) => Ok(PropertyValue::String(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(PropertyValue::Integer(i)),
            None => n.as_f64().map(PropertyValue::Float).ok_or_else(|| {
                RestError::ProtocolMismatch(format!("property '{}' holds an unrepresentable number {}", key, n))
            }),
        },
        other => Err(RestError::ProtocolMismatch(format!(
            "property '{}' holds an unsupported {} value",
            key,
            json_kind(other)
        ))),
    }
}

fn array_from_json(key: &str, items: &[Value]) -> RestResult<PropertyValue> {
    let values = items
        .iter()
        .map(|item| scalar_from_json(key, item))
        .collect::<RestResult<Vec<_>>>()?;

    // integer and float elements mix freely on the wire; widen to float
    let mut element_type = values[0].type_name();
    for value in &values[1..] {
        match (element_type, value.type_name()) {
            (a, b) if a == b => {}
            ("Integer", "Float") | ("Float", "Integer") => element_type = "Float",
            (a, b) => {
                return Err(RestError::ProtocolMismatch(format!(
                    "could not determine type of property '{}': mixes {} and {}",
                    key, a, b
                )))
            }
        }
    }

    if element_type == "Float" {
        let floats = values
            .iter()
            .filter_map(PropertyValue::as_float)
            .map(PropertyValue::Float)
            .collect();
        return Ok(PropertyValue::Array(floats));
    }
    Ok(PropertyValue::Array(values))
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Array(arr) => {
                write!(f, "[")?;
                for (i, val) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Convenience conversions
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Integer(i as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(arr: Vec<T>) -> Self {
        PropertyValue::Array(arr.into_iter().map(Into::into).collect())
    }
}

/// Property map used when creating entities
pub type PropertyMap = HashMap<String, PropertyValue>;

/// JSON object for a property map
pub fn properties_to_json(properties: &PropertyMap) -> Value {
    Value::Object(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}
