//! Tool registry: declared schemas keyed by tool name.
//!
//! Validation is side-effect-free and cheap; the registry is built once at
//! startup and shared read-only afterwards.

mod errors;
mod schema;

use std::collections::HashMap;

use tracing::debug;

use webrunner_core_types::ToolCall;

pub use errors::RegistryError;
pub use schema::{ParamSpec, ParamType, ToolSchema};

/// Registry of declared tool schemas.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSchema>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the browser tool set.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for schema in builtin_tools() {
            registry.register(schema);
        }
        registry
    }

    pub fn register(&mut self, schema: ToolSchema) {
        debug!(target: "tool_registry", tool = %schema.name, "registering tool schema");
        self.tools.insert(schema.name.clone(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn schemas(&self) -> Vec<&ToolSchema> {
        let mut schemas: Vec<&ToolSchema> = self.tools.values().collect();
        schemas.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Validate a call against its declared schema.
    pub fn validate(&self, call: &ToolCall) -> Result<(), RegistryError> {
        let schema = self
            .tools
            .get(&call.tool)
            .ok_or_else(|| RegistryError::UnknownTool(call.tool.clone()))?;

        let mut missing = Vec::new();
        let mut wrong_type = Vec::new();

        for spec in &schema.params {
            match call.params.get(&spec.name) {
                None if spec.required => missing.push(spec.name.clone()),
                None => {}
                Some(value) if !spec.param_type.matches(value) => wrong_type.push(format!(
                    "{} (expected {}, got {})",
                    spec.name,
                    spec.param_type,
                    value.type_name()
                )),
                Some(_) => {}
            }
        }

        if missing.is_empty() && wrong_type.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::InvalidParameters {
                tool: call.tool.clone(),
                missing,
                wrong_type,
            })
        }
    }
}

/// The eight browser tools recognized by the executor.
fn builtin_tools() -> Vec<ToolSchema> {
    vec![
        ToolSchema::new("navigate", "Navigate the page to a URL")
            .required("url", ParamType::String),
        ToolSchema::new("click", "Click the element matched by a selector")
            .required("selector", ParamType::String),
        ToolSchema::new("type", "Type text into the element matched by a selector")
            .required("selector", ParamType::String)
            .required("text", ParamType::String),
        ToolSchema::new("select_option", "Select an option in a select element")
            .required("selector", ParamType::String)
            .required("value", ParamType::String),
        ToolSchema::new("wait_for_element", "Wait until a selector matches an element")
            .required("selector", ParamType::String)
            .required("timeout_ms", ParamType::Int),
        ToolSchema::new("take_screenshot", "Capture a viewport screenshot"),
        ToolSchema::new("get_text", "Read the text content of an element")
            .required("selector", ParamType::String),
        ToolSchema::new("verify_element_exists", "Check whether a selector matches")
            .required("selector", ParamType::String),
    ]
}
