//! Application wiring.
//!
//! Every component is a configured object passed as an explicit
//! dependency; nothing here is a global.

use std::sync::Arc;

use browser_agent::BrowserAgent;
use error_recovery::{ErrorRecoveryService, InMemoryRecoveryHistory};
use llm_router::RoutingProvider;
use selector_heal::{InMemoryHealingHistory, SelectorHealer};
use smart_wait::{InMemoryWaitHistory, SmartWaitService};
use tool_executor::ToolExecutor;
use webrunner_task_executor::TaskExecutor;
use webrunner_tool_registry::ToolRegistry;

use crate::config::WebRunnerConfig;

/// Fully wired execution stack around one browser agent.
///
/// History stores default to the in-memory implementations; hosts that
/// persist recovery or healing rows swap their own stores in before
/// constructing the context.
pub struct AppContext {
    pub config: WebRunnerConfig,
    pub agent: Arc<dyn BrowserAgent>,
    pub registry: Arc<ToolRegistry>,
    pub tool_executor: Arc<ToolExecutor>,
    pub smart_wait: Arc<SmartWaitService>,
    pub healer: Arc<SelectorHealer>,
    pub recovery: Arc<ErrorRecoveryService>,
    pub task_executor: Arc<TaskExecutor>,
}

impl AppContext {
    pub fn new(config: WebRunnerConfig, agent: Arc<dyn BrowserAgent>) -> Self {
        let registry = Arc::new(ToolRegistry::with_builtin_tools());
        let tool_executor = Arc::new(ToolExecutor::new(
            agent.clone(),
            registry.clone(),
            config.tool_executor.clone(),
        ));
        let smart_wait = Arc::new(SmartWaitService::new(
            config.smart_wait.clone(),
            Arc::new(InMemoryWaitHistory::new(config.smart_wait.max_samples)),
        ));
        let healer = Arc::new(SelectorHealer::new(
            Arc::new(InMemoryHealingHistory::new()),
            config.healing,
        ));
        let recovery = Arc::new(
            ErrorRecoveryService::new(
                agent.clone(),
                Arc::new(InMemoryRecoveryHistory::new()),
                config.recovery.clone(),
            )
            .with_smart_wait(smart_wait.clone())
            .with_healer(healer.clone()),
        );
        let task_executor = Arc::new(
            TaskExecutor::new(
                tool_executor.clone(),
                agent.clone(),
                config.task_executor.clone(),
            )
            .with_recovery(recovery.clone()),
        );

        Self {
            config,
            agent,
            registry,
            tool_executor,
            smart_wait,
            healer,
            recovery,
            task_executor,
        }
    }

    /// Routing provider configured from this context; backends are
    /// registered by the host.
    pub fn build_router(&self) -> RoutingProvider {
        RoutingProvider::new(self.config.routing.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_agent::ScriptedBrowserAgent;

    #[test]
    fn context_wires_the_full_stack() {
        let context = AppContext::new(
            WebRunnerConfig::default(),
            Arc::new(ScriptedBrowserAgent::new()),
        );
        assert_eq!(context.registry.names().len(), 8);
        let router = context.build_router();
        assert!(router.provider_names().is_empty());
    }
}
