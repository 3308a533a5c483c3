use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use webrunner_core_types::PageState;

use crate::errors::AgentError;
use crate::BrowserAgent;

/// Scripted behavior for one invocation of a tool.
#[derive(Clone, Debug)]
pub enum ScriptedOutcome {
    /// Complete successfully.
    Succeed,
    /// Fail with the given error.
    Fail(AgentError),
    /// Sleep before succeeding; cancellation aborts the sleep.
    Delay { ms: u64 },
}

/// One recorded call against the scripted agent.
#[derive(Clone, Debug)]
pub struct ToolInvocation {
    pub operation: String,
    pub args: HashMap<String, String>,
}

#[derive(Default)]
struct ScriptState {
    queues: HashMap<String, VecDeque<ScriptedOutcome>>,
    texts: HashMap<String, String>,
    page_state: Option<PageState>,
    screenshot_bytes: Option<Vec<u8>>,
    html: String,
    journal: Vec<ToolInvocation>,
}

/// Deterministic browser agent used for tests and offline development.
///
/// Outcomes are scripted per operation name and consumed one per call; an
/// empty queue means success. The agent records every invocation so tests
/// can assert on call ordering and retry counts.
#[derive(Default)]
pub struct ScriptedBrowserAgent {
    state: Mutex<ScriptState>,
    init_calls: AtomicU32,
    dispose_calls: AtomicU32,
}

impl ScriptedBrowserAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a single outcome for the named operation.
    pub fn script(&self, operation: &str, outcome: ScriptedOutcome) {
        self.state
            .lock()
            .queues
            .entry(operation.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Queue `n` consecutive failures; calls after those succeed.
    pub fn fail_times(&self, operation: &str, n: u32, error: AgentError) {
        for _ in 0..n {
            self.script(operation, ScriptedOutcome::Fail(error.clone()));
        }
    }

    /// Set the text returned by `get_text` for a selector.
    pub fn set_text(&self, selector: &str, text: &str) {
        self.state
            .lock()
            .texts
            .insert(selector.to_string(), text.to_string());
    }

    pub fn set_page_state(&self, page_state: PageState) {
        self.state.lock().page_state = Some(page_state);
    }

    /// Bytes returned by full-page screenshots (for image-based tests).
    pub fn set_screenshot_bytes(&self, bytes: Vec<u8>) {
        self.state.lock().screenshot_bytes = Some(bytes);
    }

    pub fn set_html(&self, html: &str) {
        self.state.lock().html = html.to_string();
    }

    pub fn journal(&self) -> Vec<ToolInvocation> {
        self.state.lock().journal.clone()
    }

    pub fn invocation_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|entry| entry.operation == operation)
            .count()
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn dispose_calls(&self) -> u32 {
        self.dispose_calls.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &str, args: &[(&str, &str)]) {
        let mut state = self.state.lock();
        state.journal.push(ToolInvocation {
            operation: operation.to_string(),
            args: args
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        });
    }

    async fn run(
        &self,
        operation: &str,
        args: &[(&str, &str)],
        ct: &CancellationToken,
    ) -> Result<(), AgentError> {
        if ct.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        self.record(operation, args);
        let outcome = self
            .state
            .lock()
            .queues
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        match outcome {
            None | Some(ScriptedOutcome::Succeed) => Ok(()),
            Some(ScriptedOutcome::Fail(error)) => {
                debug!(target: "scripted_agent", operation, %error, "scripted failure");
                Err(error)
            }
            Some(ScriptedOutcome::Delay { ms }) => {
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_millis(ms)) => Ok(()),
                    _ = ct.cancelled() => Err(AgentError::Cancelled),
                }
            }
        }
    }
}

#[async_trait]
impl BrowserAgent for ScriptedBrowserAgent {
    async fn initialize(&self) -> Result<(), AgentError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) -> Result<(), AgentError> {
        self.dispose_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn navigate(&self, url: &str, ct: &CancellationToken) -> Result<(), AgentError> {
        self.run("navigate", &[("url", url)], ct).await
    }

    async fn click(&self, selector: &str, ct: &CancellationToken) -> Result<(), AgentError> {
        self.run("click", &[("selector", selector)], ct).await
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        ct: &CancellationToken,
    ) -> Result<(), AgentError> {
        self.run("type", &[("selector", selector), ("text", text)], ct)
            .await
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        ct: &CancellationToken,
    ) -> Result<(), AgentError> {
        self.run(
            "select_option",
            &[("selector", selector), ("value", value)],
            ct,
        )
        .await
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        timeout_ms: u64,
        ct: &CancellationToken,
    ) -> Result<(), AgentError> {
        let timeout = timeout_ms.to_string();
        self.run(
            "wait_for_element",
            &[("selector", selector), ("timeout_ms", &timeout)],
            ct,
        )
        .await
    }

    async fn take_screenshot(&self, ct: &CancellationToken) -> Result<String, AgentError> {
        self.run("take_screenshot", &[], ct).await?;
        Ok("aVZCT1J3MEtHZ29BQUFBTlNVaEVVZw==".to_string())
    }

    async fn take_full_page_screenshot_bytes(
        &self,
        ct: &CancellationToken,
    ) -> Result<Vec<u8>, AgentError> {
        self.run("take_full_page_screenshot", &[], ct).await?;
        let state = self.state.lock();
        Ok(state
            .screenshot_bytes
            .clone()
            .unwrap_or_else(|| vec![0x89, b'P', b'N', b'G']))
    }

    async fn get_text(
        &self,
        selector: &str,
        ct: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.run("get_text", &[("selector", selector)], ct).await?;
        let state = self.state.lock();
        Ok(state
            .texts
            .get(selector)
            .cloned()
            .unwrap_or_else(|| format!("text of {selector}")))
    }

    async fn verify_element_exists(
        &self,
        selector: &str,
        ct: &CancellationToken,
    ) -> Result<bool, AgentError> {
        self.run("verify_element_exists", &[("selector", selector)], ct)
            .await?;
        let state = self.state.lock();
        match &state.page_state {
            Some(page) if !page.elements.is_empty() => Ok(page
                .elements
                .iter()
                .any(|element| element.selector == selector)),
            _ => Ok(true),
        }
    }

    async fn get_page_state(&self, ct: &CancellationToken) -> Result<PageState, AgentError> {
        self.run("get_page_state", &[], ct).await?;
        let state = self.state.lock();
        Ok(state
            .page_state
            .clone()
            .unwrap_or_else(|| PageState::new("about:blank", "")))
    }

    async fn get_page_html(&self, ct: &CancellationToken) -> Result<String, AgentError> {
        self.run("get_page_html", &[], ct).await?;
        Ok(self.state.lock().html.clone())
    }

    async fn get_accessibility_tree(&self, ct: &CancellationToken) -> Result<String, AgentError> {
        self.run("get_accessibility_tree", &[], ct).await?;
        Ok(String::new())
    }
}
