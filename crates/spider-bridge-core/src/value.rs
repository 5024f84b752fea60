//! Host-side representation of values crossing the script boundary.
//!
//! [`Value`] is what host code passes into spider operations and receives
//! back from them. Engine conversions live in [`crate::marshal`]; this module
//! only deals with the host side (construction helpers and JSON interop).

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A marshalled value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `null` or `undefined`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. Scripts only have doubles.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered sequence.
    Array(Vec<Value>),
    /// A string-keyed mapping.
    Object(BTreeMap<String, Value>),
    /// An opaque binary stream (`Uint8Array` on the script side).
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the numeric payload.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow the sequence payload.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the mapping payload.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the binary payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Textual form: strings as they are, everything else as JSON.
    pub fn into_text(self) -> String {
        match self {
            Self::String(s) => s,
            other => other.to_json().to_string(),
        }
    }

    /// Convert to a JSON value. Bytes become an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => items.iter().map(Value::to_json).collect(),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Bytes(bytes) => bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
        }
    }

    /// Parse JSON text into a value.
    ///
    /// # Errors
    ///
    /// Returns the parser error for invalid JSON.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Value>(text).map(Self::from)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}

impl From<&[String]> for Value {
    fn from(items: &[String]) -> Self {
        Self::Array(items.iter().cloned().map(Self::String).collect())
    }
}

impl From<&BTreeMap<String, String>> for Value {
    fn from(map: &BTreeMap<String, String>) -> Self {
        Self::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), Self::String(v.clone())))
                .collect(),
        )
    }
}

impl From<&HashMap<String, String>> for Value {
    fn from(map: &HashMap<String, String>) -> Self {
        Self::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), Self::String(v.clone())))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_text() {
        assert_eq!(Value::from("plain").into_text(), "plain");
        assert_eq!(Value::Bool(true).into_text(), "true");
        assert_eq!(Value::Number(3.0).into_text(), "3");
        assert_eq!(Value::Number(1.5).into_text(), "1.5");

        let mut map = BTreeMap::new();
        map.insert("list".to_string(), Value::Array(vec![Value::from("a")]));
        assert_eq!(Value::Object(map).into_text(), r#"{"list":["a"]}"#);
    }

    #[test]
    fn test_from_json_str() {
        let value = Value::from_json_str(r#"{"a": [1, "b", null], "c": true}"#).unwrap();
        let map = value.as_object().unwrap();

        let a = map["a"].as_array().unwrap();
        assert_eq!(a[0], Value::Number(1.0));
        assert_eq!(a[1], Value::from("b"));
        assert!(a[2].is_null());
        assert_eq!(map["c"].as_bool(), Some(true));

        assert!(Value::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_string_collections() {
        let list = vec!["x".to_string(), "y".to_string()];
        let value = Value::from(list.as_slice());
        assert_eq!(
            value.as_array().unwrap(),
            &[Value::from("x"), Value::from("y")]
        );

        let empty: Vec<String> = Vec::new();
        assert_eq!(Value::from(empty.as_slice()), Value::Array(Vec::new()));

        let mut map = HashMap::new();
        map.insert("k".to_string(), "v".to_string());
        let value = Value::from(&map);
        assert_eq!(value.as_object().unwrap()["k"], Value::from("v"));
    }

    #[test]
    fn test_bytes_to_json() {
        let value = Value::Bytes(vec![1, 255]);
        assert_eq!(value.to_json(), serde_json::json!([1, 255]));
    }
}
