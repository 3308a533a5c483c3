use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parameter map carried by a tool call.
///
/// `BTreeMap` keeps key ordering stable across log lines and history rows.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Tagged parameter value.
///
/// Tools declare which type each parameter must carry; the registry enforces
/// the declaration before dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StringList(Vec<String>),
    Blob(Vec<u8>),
}

impl ParamValue {
    /// Name of the variant, used in validation error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::String(_) => "string",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
            ParamValue::StringList(_) => "string_list",
            ParamValue::Blob(_) => "blob",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(value) => Some(*value),
            ParamValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_serde_round_trip() {
        let value = ParamValue::StringList(vec!["a".into(), "b".into()]);
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("string_list"));
        let back: ParamValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn int_coerces_to_float_only() {
        let value = ParamValue::Int(7);
        assert_eq!(value.as_float(), Some(7.0));
        assert_eq!(value.as_str(), None);
        assert_eq!(value.as_bool(), None);
    }
}
