use std::fmt;

use serde::{Deserialize, Serialize};

use webrunner_core_types::ParamValue;

/// Expected type of a declared parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    StringList,
    Blob,
}

impl ParamType {
    pub fn matches(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (ParamType::String, ParamValue::String(_))
                | (ParamType::Int, ParamValue::Int(_))
                | (ParamType::Float, ParamValue::Float(_))
                | (ParamType::Float, ParamValue::Int(_))
                | (ParamType::Bool, ParamValue::Bool(_))
                | (ParamType::StringList, ParamValue::StringList(_))
                | (ParamType::Blob, ParamValue::Blob(_))
        )
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::StringList => "string_list",
            ParamType::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// Declaration of a single parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
}

/// Declared schema for one tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn required(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            param_type,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            param_type,
            required: false,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_accepts_int_widening() {
        assert!(ParamType::Float.matches(&ParamValue::Int(3)));
        assert!(ParamType::Float.matches(&ParamValue::Float(3.5)));
        assert!(!ParamType::Int.matches(&ParamValue::Float(3.5)));
    }
}
