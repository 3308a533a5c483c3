use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Document load lifecycle as reported by the browser agent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    DomContentLoaded,
    Load,
    NetworkIdle,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Bounding box of an element in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementBounds {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One interactive element observed on the page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub tag: String,
    pub selector: String,
    #[serde(default)]
    pub text: String,
    /// Raw attributes (id, class, aria-label, data-*, ...).
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub bounds: ElementBounds,
}

impl InteractiveElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Snapshot of the current page, as produced by `BrowserAgent::get_page_state`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub load_state: LoadState,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub elements: Vec<InteractiveElement>,
    /// Opaque accessibility-tree dump; consumers treat it as a string.
    #[serde(default)]
    pub accessibility_tree: Option<String>,
    /// Agent-specific signals (pending request counts, animation counts, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PageState {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            load_state: LoadState::Load,
            viewport: Viewport::default(),
            elements: Vec::new(),
            accessibility_tree: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_elements(mut self, elements: Vec<InteractiveElement>) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Numeric metadata helper; absent or non-numeric keys read as `None`.
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|value| value.as_u64())
    }

    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(|value| value.as_bool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_helpers_read_typed_values() {
        let state = PageState::new("https://example.com", "Example")
            .with_metadata("pending_requests", serde_json::json!(3))
            .with_metadata("images_loaded", serde_json::json!(true));
        assert_eq!(state.metadata_u64("pending_requests"), Some(3));
        assert_eq!(state.metadata_bool("images_loaded"), Some(true));
        assert_eq!(state.metadata_u64("missing"), None);
    }

    #[test]
    fn element_center() {
        let bounds = ElementBounds {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 40.0,
        };
        assert_eq!(bounds.center(), (60.0, 40.0));
    }
}
