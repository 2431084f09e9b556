//! Property values
//!
//! Tagged scalar values stored in a node's property bag, plus the boundary
//! checks applied to type labels, property keys and group names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Name of the variant, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Value::Float(f) = self {
            if !f.is_finite() {
                return Err(GraphError::Validation(format!(
                    "float property values must be finite, got {}",
                    f
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Check a node type label
pub(crate) fn validate_type(node_type: &str) -> Result<()> {
    if node_type.is_empty() {
        return Err(GraphError::Validation("node type must not be empty".into()));
    }
    if node_type.trim() != node_type {
        return Err(GraphError::Validation(format!(
            "node type '{}' has surrounding whitespace",
            node_type
        )));
    }
    Ok(())
}

/// Check a property key
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(GraphError::Validation("property key must not be empty".into()));
    }
    Ok(())
}

/// Check a group name
pub(crate) fn validate_group(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GraphError::Validation("group name must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::from("v"), "string")]
    #[case(Value::from(42i64), "integer")]
    #[case(Value::from(1.5), "float")]
    #[case(Value::from(true), "bool")]
    #[case(Value::from(Utc::now()), "date")]
    fn test_value_kind(#[case] value: Value, #[case] kind: &str) {
        assert_eq!(value.kind(), kind);
        assert!(value.validate().is_ok());
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn test_non_finite_float_rejected(#[case] f: f64) {
        let err = Value::Float(f).validate().unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from("v").as_str(), Some("v"));
        assert_eq!(Value::from(7i32).as_i64(), Some(7));
        assert_eq!(Value::from(7i32).as_f64(), Some(7.0));
        assert_eq!(Value::from(false).as_bool(), Some(false));
        assert_eq!(Value::from("v").as_i64(), None);
        assert!(Value::from("v") == "v");
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let json = serde_json::to_value(Value::from(3i64)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "integer", "value": 3}));
    }

    #[rstest]
    #[case("", false)]
    #[case(" T", false)]
    #[case("T ", false)]
    #[case("T", true)]
    #[case("User Profile", true)]
    fn test_validate_type(#[case] label: &str, #[case] ok: bool) {
        assert_eq!(validate_type(label).is_ok(), ok);
    }

    #[test]
    fn test_validate_key_and_group() {
        assert!(validate_key("").is_err());
        assert!(validate_key("p").is_ok());
        assert!(validate_group("").is_err());
        assert!(validate_group("g").is_ok());
    }
}
