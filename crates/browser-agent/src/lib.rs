//! Browser agent capability boundary.
//!
//! The core never talks to a concrete driver; it talks to [`BrowserAgent`].
//! A deterministic [`ScriptedBrowserAgent`] ships alongside the trait for
//! tests and offline development, in the same way mock LLM providers do.

mod errors;
mod scripted;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use webrunner_core_types::PageState;

pub use errors::AgentError;
pub use scripted::{ScriptedBrowserAgent, ScriptedOutcome, ToolInvocation};

/// Capability set required from a browser driver.
///
/// Every operation takes a cancellation token; implementations are expected
/// to abandon in-flight work promptly once it fires. Errors must carry
/// recognizable messages since the error classifier inspects them.
#[async_trait]
pub trait BrowserAgent: Send + Sync {
    /// Prepare the underlying browser context. Idempotent.
    async fn initialize(&self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Discard the underlying browser context.
    async fn dispose(&self) -> Result<(), AgentError> {
        Ok(())
    }

    async fn navigate(&self, url: &str, ct: &CancellationToken) -> Result<(), AgentError>;

    async fn click(&self, selector: &str, ct: &CancellationToken) -> Result<(), AgentError>;

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        ct: &CancellationToken,
    ) -> Result<(), AgentError>;

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        ct: &CancellationToken,
    ) -> Result<(), AgentError>;

    async fn wait_for_element(
        &self,
        selector: &str,
        timeout_ms: u64,
        ct: &CancellationToken,
    ) -> Result<(), AgentError>;

    /// Viewport screenshot as base64-encoded PNG.
    async fn take_screenshot(&self, ct: &CancellationToken) -> Result<String, AgentError>;

    /// Full-page screenshot as raw PNG bytes.
    async fn take_full_page_screenshot_bytes(
        &self,
        ct: &CancellationToken,
    ) -> Result<Vec<u8>, AgentError>;

    async fn get_text(&self, selector: &str, ct: &CancellationToken)
        -> Result<String, AgentError>;

    async fn verify_element_exists(
        &self,
        selector: &str,
        ct: &CancellationToken,
    ) -> Result<bool, AgentError>;

    async fn get_page_state(&self, ct: &CancellationToken) -> Result<PageState, AgentError>;

    async fn get_page_html(&self, ct: &CancellationToken) -> Result<String, AgentError>;

    async fn get_accessibility_tree(&self, ct: &CancellationToken) -> Result<String, AgentError>;
}
